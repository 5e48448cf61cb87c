//! CLI definition and dispatch.

use chrono::{DateTime, Duration, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::clock::{ManualClock, SystemClock};
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{validate_exchange_config, LOG_LEVELS};
use crate::domain::error::ExchangeError;
use crate::domain::exchange::Exchange;
use crate::domain::stock::{vwsp_window, DEFAULT_VWSP_WINDOW_MINUTES};
use crate::domain::trade::{TimeWindow, TradeRequest};
use crate::ports::clock_port::Clock;
use crate::ports::config_port::ConfigPort;
use crate::ports::stock_source_port::StockSourcePort;

#[derive(Parser, Debug)]
#[command(name = "gbce", about = "Global Beverage Corporation Exchange")]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Stock definition CSV (defaults to the built-in GBCE table)
    #[arg(long)]
    pub stocks: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List registered stocks
    Stocks {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Show dividend yield and P/E ratio of a stock at a price
    Quote {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        price: f64,
    },
    /// Record trades from a file and report VWSP and the All Share Index
    Replay {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        trades: Option<PathBuf>,
        #[arg(long)]
        window_minutes: Option<i64>,
        /// Report VWSP over trades at or after this RFC 3339 instant
        #[arg(long, requires = "until")]
        since: Option<DateTime<Utc>>,
        /// Report VWSP over trades at or before this RFC 3339 instant
        #[arg(long, requires = "since")]
        until: Option<DateTime<Utc>>,
        /// Fail on the first rejected trade instead of skipping it
        #[arg(long)]
        strict: bool,
    },
    /// Validate a configuration file and the files it names
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Resolved settings, after config file values and CLI overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeSettings {
    pub stocks_path: Option<PathBuf>,
    pub trades_path: Option<PathBuf>,
    pub window: Duration,
    pub log_level: String,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        ExchangeSettings {
            stocks_path: None,
            trades_path: None,
            window: Duration::minutes(DEFAULT_VWSP_WINDOW_MINUTES),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplaySummary {
    pub recorded: usize,
    pub skipped: usize,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Stocks { source } => run_stocks(&source),
        Command::Quote {
            source,
            symbol,
            price,
        } => run_quote(&source, &symbol, price),
        Command::Replay {
            source,
            trades,
            window_minutes,
            since,
            until,
            strict,
        } => {
            let window = match (since, until) {
                (Some(start), Some(end)) => match TimeWindow::new(start, end) {
                    Ok(w) => Some(w),
                    Err(e) => {
                        eprintln!("error: {e}");
                        return (&e).into();
                    }
                },
                _ => None,
            };
            run_replay(&source, trades, window_minutes, window, strict)
        }
        Command::Validate { config } => run_validate(&config),
    }
}

/// `tracing` filter directive for this invocation.
///
/// `--verbose` wins over `[log] level`; an unreadable config or unknown level
/// falls back to info.
pub fn log_filter(cli: &Cli) -> String {
    if cli.verbose {
        return "gbce=debug".to_string();
    }
    let config_path = match &cli.command {
        Command::Stocks { source }
        | Command::Quote { source, .. }
        | Command::Replay { source, .. } => source.config.as_deref(),
        Command::Validate { config } => Some(config.as_path()),
    };
    let level = config_path
        .and_then(|path| FileConfigAdapter::from_file(path).ok())
        .and_then(|config| build_exchange_settings(&config).ok())
        .map(|settings| settings.log_level)
        .filter(|level| LOG_LEVELS.contains(&level.as_str()))
        .unwrap_or_else(|| "info".to_string());
    format!("gbce={level}")
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = ExchangeError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

pub fn build_exchange_settings(config: &dyn ConfigPort) -> Result<ExchangeSettings, ExchangeError> {
    let minutes = config
        .get_int("exchange", "vwsp_window_minutes")
        .map_err(|reason| ExchangeError::ConfigInvalid {
            section: "exchange".into(),
            key: "vwsp_window_minutes".into(),
            reason,
        })?
        .unwrap_or(DEFAULT_VWSP_WINDOW_MINUTES);
    let window = vwsp_window(minutes).map_err(|e| ExchangeError::ConfigInvalid {
        section: "exchange".into(),
        key: "vwsp_window_minutes".into(),
        reason: e.to_string(),
    })?;

    Ok(ExchangeSettings {
        stocks_path: config.get_path("exchange", "stocks"),
        trades_path: config.get_path("exchange", "trades"),
        window,
        log_level: config
            .get_string("log", "level")
            .map(|level| level.trim().to_lowercase())
            .unwrap_or_else(|| "info".to_string()),
    })
}

/// Loads, validates and converts the config named by `source`, then applies overrides.
pub fn resolve_settings(source: &SourceArgs) -> Result<ExchangeSettings, ExitCode> {
    let mut settings = match &source.config {
        Some(path) => {
            tracing::info!(config = %path.display(), "loading config");
            let adapter = load_config(path)?;
            let built = validate_exchange_config(&adapter)
                .and_then(|()| build_exchange_settings(&adapter));
            match built {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("error: {e}");
                    return Err((&e).into());
                }
            }
        }
        None => ExchangeSettings::default(),
    };
    if let Some(stocks) = &source.stocks {
        settings.stocks_path = Some(stocks.clone());
    }
    Ok(settings)
}

pub fn build_exchange(
    source: &dyn StockSourcePort,
    settings: &ExchangeSettings,
    clock: Arc<dyn Clock>,
) -> Result<Exchange, ExchangeError> {
    let definitions = source.load_stocks()?;
    tracing::info!(stocks = definitions.len(), "registering stocks");
    let mut exchange = Exchange::new(clock).with_window(settings.window)?;
    exchange.add_stocks(definitions)?;
    Ok(exchange)
}

/// Records every request in order.
///
/// When `clock` is given, it is set to each request's `requested_at` before
/// the trade is recorded. Rejected requests are skipped with a warning unless
/// `strict` is set, in which case the first rejection is returned.
pub fn replay_trades(
    exchange: &mut Exchange,
    requests: &[TradeRequest],
    clock: Option<&ManualClock>,
    strict: bool,
) -> Result<ReplaySummary, ExchangeError> {
    let mut summary = ReplaySummary::default();
    for (index, request) in requests.iter().enumerate() {
        if let (Some(clock), Some(at)) = (clock, request.requested_at) {
            clock.set(at);
        }
        match exchange.apply(request) {
            Ok(_) => summary.recorded += 1,
            Err(e) if !strict => {
                tracing::warn!(
                    request = index + 1,
                    symbol = %request.symbol,
                    error = %e,
                    "skipping trade"
                );
                summary.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(summary)
}

pub fn render_stock_table(exchange: &Exchange) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<8} {:<10} {:>14} {:>10} {:>15}\n",
        "Symbol", "Type", "Last Dividend", "Par Value", "Fixed Dividend"
    ));
    for stock in exchange.stocks() {
        let fixed = stock
            .fixed_dividend()
            .map(|f| format!("{:.2}%", f * 100.0))
            .unwrap_or_default();
        out.push_str(&format!(
            "{:<8} {:<10} {:>14} {:>10} {:>15}\n",
            stock.symbol(),
            stock.kind().to_string(),
            stock.last_dividend(),
            stock.par_value(),
            fixed
        ));
    }
    out
}

pub fn render_quote(exchange: &Exchange, symbol: &str, price: f64) -> Result<String, ExchangeError> {
    let stock = exchange.get_stock(symbol)?;
    let dividend_yield = stock.dividend_yield(price)?;
    let pe_ratio = stock.pe_ratio(price)?;
    Ok(format!(
        "{} ({}) at {}\n  Dividend Yield: {:.4}\n  P/E Ratio:      {:.4}\n",
        stock.symbol(),
        stock.kind(),
        price,
        dividend_yield,
        pe_ratio
    ))
}

/// Per-stock trade counts and VWSP followed by the All Share Index.
///
/// With `window`, per-stock figures cover that explicit window; otherwise they
/// use each stock's trailing default window. The index always uses the
/// default window.
pub fn render_index_report(
    exchange: &Exchange,
    window: Option<TimeWindow>,
) -> Result<String, ExchangeError> {
    let mut out = String::new();
    out.push_str(&format!("{:<8} {:>8} {:>14}\n", "Symbol", "Trades", "VWSP"));
    for stock in exchange.stocks() {
        let (trades, vwsp) = match window {
            Some(w) => (
                stock.trades_in(w.start(), w.end())?.len(),
                stock.volume_weighted_price_in(w),
            ),
            None => (stock.trades().len(), stock.volume_weighted_price()?),
        };
        out.push_str(&format!("{:<8} {:>8} {:>14.4}\n", stock.symbol(), trades, vwsp));
    }
    out.push_str(&format!(
        "\nAll Share Index: {:.6}\n",
        exchange.all_share_index()?
    ));
    Ok(out)
}

fn load_exchange(source: &SourceArgs) -> Result<Exchange, ExitCode> {
    let settings = resolve_settings(source)?;
    let adapter = CsvAdapter::new(settings.stocks_path.clone(), None);
    build_exchange(&adapter, &settings, Arc::new(SystemClock)).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

fn run_stocks(source: &SourceArgs) -> ExitCode {
    let exchange = match load_exchange(source) {
        Ok(e) => e,
        Err(code) => return code,
    };
    print!("{}", render_stock_table(&exchange));
    ExitCode::SUCCESS
}

fn run_quote(source: &SourceArgs, symbol: &str, price: f64) -> ExitCode {
    let exchange = match load_exchange(source) {
        Ok(e) => e,
        Err(code) => return code,
    };
    match render_quote(&exchange, symbol, price) {
        Ok(text) => {
            print!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_replay(
    source: &SourceArgs,
    trades_override: Option<PathBuf>,
    window_minutes: Option<i64>,
    window: Option<TimeWindow>,
    strict: bool,
) -> ExitCode {
    let mut settings = match resolve_settings(source) {
        Ok(s) => s,
        Err(code) => return code,
    };
    if let Some(trades) = trades_override {
        settings.trades_path = Some(trades);
    }
    if let Some(minutes) = window_minutes {
        settings.window = match vwsp_window(minutes) {
            Ok(window) => window,
            Err(e) => {
                eprintln!("error: --window-minutes: {e}");
                return (&e).into();
            }
        };
    }
    if settings.trades_path.is_none() {
        eprintln!("error: no trades file configured (use --trades or [exchange] trades)");
        return ExitCode::from(2);
    }

    let adapter = CsvAdapter::new(settings.stocks_path.clone(), settings.trades_path.clone());
    let requests = match adapter.load_trades() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Timestamped trade files replay on a manual clock so windows follow the file.
    let first_stamp = requests.iter().find_map(|r| r.requested_at);
    let manual_clock = first_stamp.map(|at| Arc::new(ManualClock::new(at)));
    let clock: Arc<dyn Clock> = match &manual_clock {
        Some(c) => c.clone(),
        None => Arc::new(SystemClock),
    };

    let mut exchange = match build_exchange(&adapter, &settings, clock) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    tracing::info!(trades = requests.len(), "replaying trades");
    let summary = match replay_trades(&mut exchange, &requests, manual_clock.as_deref(), strict) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    tracing::info!(
        recorded = summary.recorded,
        skipped = summary.skipped,
        "replay complete"
    );

    match render_index_report(&exchange, window) {
        Ok(report) => {
            print!("{report}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let settings = match validate_exchange_config(&adapter)
        .and_then(|()| build_exchange_settings(&adapter))
    {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let source = CsvAdapter::new(settings.stocks_path.clone(), settings.trades_path.clone());
    let exchange = match build_exchange(&source, &settings, Arc::new(SystemClock)) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let trades = match source.load_trades() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("  stocks:  {}", exchange.len());
    eprintln!("  trades:  {}", trades.len());
    eprintln!("  window:  {} minutes", settings.window.num_minutes());
    eprintln!("  log:     {}", settings.log_level);
    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

//! Stock definitions, trade history and per-stock metrics.

use crate::domain::error::ExchangeError;
use crate::domain::trade::{self, Side, TimeWindow, Trade};
use crate::ports::clock_port::Clock;
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Trailing window used by [`Stock::volume_weighted_price`] unless overridden.
pub const DEFAULT_VWSP_WINDOW_MINUTES: i64 = 5;

/// Longest accepted VWSP window, one hundred years.
pub const MAX_VWSP_WINDOW_MINUTES: i64 = 100 * 366 * 24 * 60;

/// VWSP window of `minutes`, within `1..=MAX_VWSP_WINDOW_MINUTES`.
pub fn vwsp_window(minutes: i64) -> Result<Duration, ExchangeError> {
    if !(1..=MAX_VWSP_WINDOW_MINUTES).contains(&minutes) {
        return Err(ExchangeError::validation(format!(
            "VWSP window should be between 1 and {MAX_VWSP_WINDOW_MINUTES} minutes, got {minutes}"
        )));
    }
    Duration::try_minutes(minutes).ok_or_else(|| {
        ExchangeError::validation(format!("VWSP window of {minutes} minutes is out of range"))
    })
}

pub(crate) fn validate_window(window: Duration) -> Result<(), ExchangeError> {
    if window <= Duration::zero() || window > Duration::minutes(MAX_VWSP_WINDOW_MINUTES) {
        return Err(ExchangeError::validation(format!(
            "VWSP window should be positive and at most {MAX_VWSP_WINDOW_MINUTES} minutes"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StockKind {
    Common,
    Preferred,
}

impl fmt::Display for StockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StockKind::Common => write!(f, "Common"),
            StockKind::Preferred => write!(f, "Preferred"),
        }
    }
}

impl FromStr for StockKind {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "common" => Ok(StockKind::Common),
            "preferred" => Ok(StockKind::Preferred),
            _ => Err(ExchangeError::validation(format!(
                "stock type should be Common or Preferred, got '{}'",
                s.trim()
            ))),
        }
    }
}

/// Static attributes of a stock, validated as a whole before registration.
///
/// Amounts (`par_value`, `last_dividend`) are in the caller's minor currency
/// unit; `fixed_dividend` is a fraction in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct StockDefinition {
    pub symbol: String,
    pub kind: StockKind,
    pub par_value: u64,
    pub last_dividend: u64,
    pub fixed_dividend: Option<f64>,
}

impl StockDefinition {
    pub fn common(symbol: impl Into<String>, par_value: u64, last_dividend: u64) -> Self {
        StockDefinition {
            symbol: symbol.into(),
            kind: StockKind::Common,
            par_value,
            last_dividend,
            fixed_dividend: None,
        }
    }

    pub fn preferred(
        symbol: impl Into<String>,
        par_value: u64,
        last_dividend: u64,
        fixed_dividend: f64,
    ) -> Self {
        StockDefinition {
            symbol: symbol.into(),
            kind: StockKind::Preferred,
            par_value,
            last_dividend,
            fixed_dividend: Some(fixed_dividend),
        }
    }

    pub fn validate(&self) -> Result<(), ExchangeError> {
        if self.symbol.trim().is_empty() {
            return Err(ExchangeError::validation("stock symbol should not be empty"));
        }
        if let Some(fixed) = self.fixed_dividend {
            if !(0.0..=1.0).contains(&fixed) {
                return Err(ExchangeError::validation(format!(
                    "fixed dividend should be between 0 and 1, got {fixed}"
                )));
            }
        }
        Ok(())
    }
}

/// Parses a non-negative integer amount such as a par value or dividend.
pub fn parse_amount(field: &str, raw: &str) -> Result<u64, ExchangeError> {
    let value: i64 = raw.trim().parse().map_err(|_| {
        ExchangeError::validation(format!("{field} should be an integer, got '{}'", raw.trim()))
    })?;
    u64::try_from(value)
        .map_err(|_| ExchangeError::validation(format!("{field} should be >= 0, got {value}")))
}

/// Parses a fixed dividend written either as a fraction (`0.02`) or a percentage (`2%`).
pub fn parse_fixed_dividend(raw: &str) -> Result<Option<f64>, ExchangeError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let (digits, scale) = match raw.strip_suffix('%') {
        Some(digits) => (digits.trim(), 100.0),
        None => (raw, 1.0),
    };
    let value: f64 = digits.parse().map_err(|_| {
        ExchangeError::validation(format!("fixed dividend should be a number, got '{raw}'"))
    })?;
    Ok(Some(value / scale))
}

/// A registered stock and its append-only trade history.
pub struct Stock {
    definition: StockDefinition,
    trades: Vec<Trade>,
    clock: Arc<dyn Clock>,
    window: Duration,
}

impl fmt::Debug for Stock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stock")
            .field("definition", &self.definition)
            .field("trades", &self.trades.len())
            .field("window", &self.window)
            .finish()
    }
}

impl Stock {
    pub fn new(definition: StockDefinition, clock: Arc<dyn Clock>) -> Result<Self, ExchangeError> {
        Self::with_window(
            definition,
            clock,
            Duration::minutes(DEFAULT_VWSP_WINDOW_MINUTES),
        )
    }

    pub fn with_window(
        definition: StockDefinition,
        clock: Arc<dyn Clock>,
        window: Duration,
    ) -> Result<Self, ExchangeError> {
        definition.validate()?;
        validate_window(window)?;
        Ok(Stock {
            definition,
            trades: Vec::new(),
            clock,
            window,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.definition.symbol
    }

    pub fn kind(&self) -> StockKind {
        self.definition.kind
    }

    pub fn par_value(&self) -> u64 {
        self.definition.par_value
    }

    pub fn last_dividend(&self) -> u64 {
        self.definition.last_dividend
    }

    pub fn fixed_dividend(&self) -> Option<f64> {
        self.definition.fixed_dividend
    }

    pub fn definition(&self) -> &StockDefinition {
        &self.definition
    }

    pub fn is_preferred(&self) -> bool {
        self.definition.kind == StockKind::Preferred
    }

    /// Trade history in recording order, which is also timestamp order.
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn buy(&mut self, price: f64, quantity: u64) -> Result<&Trade, ExchangeError> {
        self.record_trade(price, quantity, Side::Buy)
    }

    pub fn sell(&mut self, price: f64, quantity: u64) -> Result<&Trade, ExchangeError> {
        self.record_trade(price, quantity, Side::Sell)
    }

    /// Validates and appends a trade stamped with the current clock reading.
    ///
    /// Timestamps never go backwards within one history: a clock reading
    /// earlier than the last trade is clamped to the last trade's timestamp.
    pub fn record_trade(
        &mut self,
        price: f64,
        quantity: u64,
        side: Side,
    ) -> Result<&Trade, ExchangeError> {
        let mut timestamp = self.clock.now();
        if let Some(last) = self.trades.last() {
            timestamp = timestamp.max(last.timestamp());
        }
        let trade = Trade::new(self.symbol(), price, quantity, side, timestamp)?;
        tracing::debug!(
            symbol = %self.definition.symbol,
            %side,
            price,
            quantity,
            "trade recorded"
        );
        self.trades.push(trade);
        Ok(&self.trades[self.trades.len() - 1])
    }

    pub fn dividend_yield(&self, price: f64) -> Result<f64, ExchangeError> {
        trade::validate_price(price)?;
        match self.definition.kind {
            StockKind::Preferred => self.preferred_dividend_yield(price),
            StockKind::Common => Ok(self.definition.last_dividend as f64 / price),
        }
    }

    fn preferred_dividend_yield(&self, price: f64) -> Result<f64, ExchangeError> {
        if !self.is_preferred() {
            return Err(ExchangeError::InvalidOperation {
                reason: format!("{} is not a preferred stock", self.symbol()),
            });
        }
        let fixed = self
            .definition
            .fixed_dividend
            .ok_or_else(|| ExchangeError::InvalidOperation {
                reason: format!("preferred stock {} has no fixed dividend", self.symbol()),
            })?;
        Ok(fixed * self.definition.par_value as f64 / price)
    }

    /// Price over last dividend; 0 for a stock that pays no dividend.
    pub fn pe_ratio(&self, price: f64) -> Result<f64, ExchangeError> {
        trade::validate_price(price)?;
        if self.definition.last_dividend == 0 {
            return Ok(0.0);
        }
        Ok(price / self.definition.last_dividend as f64)
    }

    /// VWSP over the trailing window ending at the clock's current reading.
    pub fn volume_weighted_price(&self) -> Result<f64, ExchangeError> {
        let window = TimeWindow::trailing(self.clock.now(), self.window)?;
        Ok(self.volume_weighted_price_in(window))
    }

    pub fn volume_weighted_price_in(&self, window: TimeWindow) -> f64 {
        trade::volume_weighted_price(self.window_trades(window))
    }

    /// VWSP over every trade ever recorded.
    pub fn lifetime_volume_weighted_price(&self) -> f64 {
        trade::volume_weighted_price(&self.trades)
    }

    /// Trades with `start <= timestamp <= end`, in recording order.
    pub fn trades_in(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<&Trade>, ExchangeError> {
        let window = TimeWindow::new(start, end)?;
        Ok(self.window_trades(window).collect())
    }

    fn window_trades(&self, window: TimeWindow) -> impl Iterator<Item = &Trade> {
        // History is sorted by timestamp, so the window is a contiguous slice.
        let first = self
            .trades
            .partition_point(|t| t.timestamp() < window.start());
        let last = self
            .trades
            .partition_point(|t| t.timestamp() <= window.end());
        self.trades[first..last].iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::clock::ManualClock;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    fn stock_with_clock(definition: StockDefinition) -> (Stock, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start()));
        let stock = Stock::new(definition, clock.clone()).unwrap();
        (stock, clock)
    }

    fn pop() -> (Stock, Arc<ManualClock>) {
        stock_with_clock(StockDefinition::common("POP", 100, 8))
    }

    fn gin() -> (Stock, Arc<ManualClock>) {
        stock_with_clock(StockDefinition::preferred("GIN", 100, 8, 0.02))
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("Common".parse::<StockKind>().unwrap(), StockKind::Common);
        assert_eq!("preferred".parse::<StockKind>().unwrap(), StockKind::Preferred);
        assert!(matches!(
            "Wrong".parse::<StockKind>(),
            Err(ExchangeError::Validation { .. })
        ));
    }

    #[test]
    fn definition_rejects_out_of_range_fixed_dividend() {
        let def = StockDefinition::preferred("NOS", 60, 23, 343.0);
        assert!(matches!(def.validate(), Err(ExchangeError::Validation { .. })));
        let def = StockDefinition::preferred("NOS", 60, 23, -0.1);
        assert!(def.validate().is_err());
        assert!(StockDefinition::preferred("NOS", 60, 23, 1.0).validate().is_ok());
        assert!(StockDefinition::preferred("NOS", 60, 23, 0.0).validate().is_ok());
    }

    #[test]
    fn definition_rejects_empty_symbol() {
        assert!(StockDefinition::common("  ", 60, 23).validate().is_err());
    }

    #[test]
    fn parse_amount_rejects_negative_and_garbage() {
        assert_eq!(parse_amount("par value", " 60 ").unwrap(), 60);
        assert!(matches!(
            parse_amount("par value", "-60"),
            Err(ExchangeError::Validation { reason }) if reason.contains(">= 0")
        ));
        assert!(parse_amount("last dividend", "abc").is_err());
    }

    #[test]
    fn parse_fixed_dividend_accepts_fraction_and_percent() {
        assert_eq!(parse_fixed_dividend("").unwrap(), None);
        assert_eq!(parse_fixed_dividend("0.02").unwrap(), Some(0.02));
        assert_relative_eq!(parse_fixed_dividend("2%").unwrap().unwrap(), 0.02);
        assert!(parse_fixed_dividend("two").is_err());
    }

    #[test]
    fn dividend_yield_common() {
        let (stock, _) = pop();
        assert_relative_eq!(stock.dividend_yield(100.0).unwrap(), 0.08);
    }

    #[test]
    fn dividend_yield_preferred() {
        let (stock, _) = gin();
        assert_relative_eq!(stock.dividend_yield(200.0).unwrap(), 0.01);
    }

    #[test]
    fn dividend_yield_preferred_without_fixed_dividend_is_invalid() {
        let def = StockDefinition {
            fixed_dividend: None,
            ..StockDefinition::preferred("GIN", 100, 8, 0.02)
        };
        let (stock, _) = stock_with_clock(def);
        assert!(matches!(
            stock.dividend_yield(200.0),
            Err(ExchangeError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn common_stock_ignores_fixed_dividend() {
        let def = StockDefinition {
            fixed_dividend: Some(0.5),
            ..StockDefinition::common("POP", 100, 8)
        };
        let (stock, _) = stock_with_clock(def);
        assert_relative_eq!(stock.dividend_yield(100.0).unwrap(), 0.08);
    }

    #[test]
    fn preferred_path_on_common_stock_is_invalid() {
        let (stock, _) = pop();
        assert!(matches!(
            stock.preferred_dividend_yield(200.0),
            Err(ExchangeError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn metrics_reject_non_positive_price() {
        let (stock, _) = gin();
        for price in [0.0, -100.0] {
            assert!(matches!(
                stock.dividend_yield(price),
                Err(ExchangeError::Validation { .. })
            ));
            assert!(matches!(
                stock.pe_ratio(price),
                Err(ExchangeError::Validation { .. })
            ));
        }
    }

    #[test]
    fn pe_ratio_divides_by_last_dividend() {
        let (stock, _) = pop();
        assert_relative_eq!(stock.pe_ratio(300.0).unwrap(), 37.5);
    }

    #[test]
    fn pe_ratio_is_zero_without_dividend() {
        let (stock, _) = stock_with_clock(StockDefinition::common("TEA", 100, 0));
        assert_eq!(stock.pe_ratio(300.0).unwrap(), 0.0);
    }

    #[test]
    fn record_trade_appends_with_clock_timestamp() {
        let (mut stock, clock) = pop();
        clock.advance(Duration::seconds(30));
        let trade = stock.sell(200.0, 500).unwrap().clone();
        assert_eq!(trade.symbol(), "POP");
        assert_eq!(trade.side(), Side::Sell);
        assert_eq!(trade.timestamp(), start() + Duration::seconds(30));
        assert_eq!(stock.trades(), &[trade]);
    }

    #[test]
    fn rejected_trade_leaves_history_untouched() {
        let (mut stock, _) = pop();
        stock.buy(10.0, 1).unwrap();
        assert!(stock.buy(-1.0, 10).is_err());
        assert!(stock.sell(10.0, 0).is_err());
        assert_eq!(stock.trades().len(), 1);
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let (mut stock, clock) = pop();
        clock.advance(Duration::minutes(2));
        stock.buy(10.0, 1).unwrap();
        clock.set(start());
        stock.buy(11.0, 1).unwrap();
        let stamps: Vec<_> = stock.trades().iter().map(|t| t.timestamp()).collect();
        assert_eq!(stamps[0], stamps[1]);
    }

    #[test]
    fn vwsp_without_trades_is_zero() {
        let (stock, _) = pop();
        assert_eq!(stock.volume_weighted_price().unwrap(), 0.0);
        assert_eq!(stock.lifetime_volume_weighted_price(), 0.0);
    }

    #[test]
    fn vwsp_over_recent_trades() {
        let (mut stock, _) = pop();
        stock.buy(20.0, 200).unwrap();
        stock.buy(200.0, 200).unwrap();
        stock.buy(150.0, 400).unwrap();
        stock.sell(350.0, 300).unwrap();
        assert_eq!(stock.volume_weighted_price().unwrap(), 190.0);
    }

    #[test]
    fn vwsp_default_window_drops_old_trades() {
        let (mut stock, clock) = pop();
        stock.buy(100.0, 10).unwrap();
        clock.advance(Duration::minutes(4));
        stock.buy(200.0, 10).unwrap();

        clock.advance(Duration::minutes(1));
        // First trade sits exactly on the window's start bound.
        assert_relative_eq!(stock.volume_weighted_price().unwrap(), 150.0);

        clock.advance(Duration::seconds(1));
        assert_relative_eq!(stock.volume_weighted_price().unwrap(), 200.0);

        clock.advance(Duration::minutes(10));
        assert_eq!(stock.volume_weighted_price().unwrap(), 0.0);
        assert_relative_eq!(stock.lifetime_volume_weighted_price(), 150.0);
    }

    #[test]
    fn custom_window_length() {
        let clock = Arc::new(ManualClock::new(start()));
        let mut stock = Stock::with_window(
            StockDefinition::common("POP", 100, 8),
            clock.clone(),
            Duration::minutes(15),
        )
        .unwrap();
        stock.buy(100.0, 10).unwrap();
        clock.advance(Duration::minutes(10));
        assert_relative_eq!(stock.volume_weighted_price().unwrap(), 100.0);
    }

    #[test]
    fn non_positive_window_is_rejected() {
        let clock = Arc::new(ManualClock::new(start()));
        let result = Stock::with_window(
            StockDefinition::common("POP", 100, 8),
            clock,
            Duration::zero(),
        );
        assert!(matches!(result, Err(ExchangeError::Validation { .. })));
    }

    #[test]
    fn oversized_window_is_rejected() {
        let clock = Arc::new(ManualClock::new(start()));
        let result = Stock::with_window(
            StockDefinition::common("POP", 100, 8),
            clock,
            Duration::days(365 * 300_000),
        );
        assert!(matches!(result, Err(ExchangeError::Validation { .. })));
    }

    #[test]
    fn vwsp_window_from_minutes() {
        assert_eq!(vwsp_window(15).unwrap(), Duration::minutes(15));
        assert_eq!(
            vwsp_window(MAX_VWSP_WINDOW_MINUTES).unwrap(),
            Duration::minutes(MAX_VWSP_WINDOW_MINUTES)
        );
        assert!(vwsp_window(0).is_err());
        assert!(vwsp_window(MAX_VWSP_WINDOW_MINUTES + 1).is_err());
        assert!(vwsp_window(i64::MAX).is_err());
    }

    #[test]
    fn trades_in_is_inclusive_and_ordered() {
        let (mut stock, clock) = pop();
        for minute in 0..5 {
            stock.buy(10.0 + minute as f64, 1).unwrap();
            clock.advance(Duration::minutes(1));
        }
        let selected = stock
            .trades_in(start() + Duration::minutes(1), start() + Duration::minutes(3))
            .unwrap();
        let prices: Vec<f64> = selected.iter().map(|t| t.price()).collect();
        assert_eq!(prices, vec![11.0, 12.0, 13.0]);
    }

    #[test]
    fn trades_in_rejects_inverted_bounds() {
        let (stock, _) = pop();
        assert!(matches!(
            stock.trades_in(start(), start()),
            Err(ExchangeError::Validation { .. })
        ));
        assert!(stock
            .trades_in(start() + Duration::minutes(1), start())
            .is_err());
    }

    #[test]
    fn vwsp_in_explicit_window() {
        let (mut stock, clock) = pop();
        stock.buy(100.0, 10).unwrap();
        clock.advance(Duration::hours(1));
        stock.buy(300.0, 30).unwrap();
        let window = TimeWindow::new(start(), start() + Duration::minutes(1)).unwrap();
        assert_relative_eq!(stock.volume_weighted_price_in(window), 100.0);
        let window = TimeWindow::new(start(), start() + Duration::hours(2)).unwrap();
        assert_relative_eq!(stock.volume_weighted_price_in(window), 250.0);
    }
}

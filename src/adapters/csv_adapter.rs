//! CSV stock definition and trade request adapter.
//!
//! Stock files: `symbol,type,last_dividend,fixed_dividend,par_value`.
//! Trade files: `symbol,side,price,quantity[,timestamp]`, timestamps in RFC 3339.

use crate::domain::error::ExchangeError;
use crate::domain::stock::{self, StockDefinition, StockKind};
use crate::domain::trade::{Side, TradeRequest};
use crate::ports::stock_source_port::StockSourcePort;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

/// The GBCE sample table, used when no stock file is configured.
pub const DEFAULT_STOCKS_CSV: &str = include_str!("../../data/stocks.csv");

pub struct CsvAdapter {
    stocks_path: Option<PathBuf>,
    trades_path: Option<PathBuf>,
}

impl CsvAdapter {
    pub fn new(stocks_path: Option<PathBuf>, trades_path: Option<PathBuf>) -> Self {
        Self {
            stocks_path,
            trades_path,
        }
    }

    pub fn parse_stocks(content: &str) -> Result<Vec<StockDefinition>, ExchangeError> {
        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut definitions = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| ExchangeError::DataSource {
                reason: format!("CSV parse error: {}", e),
            })?;
            let line = line_of(&record);

            let symbol = field(&record, 0, "symbol", line)?.trim().to_string();
            let kind: StockKind = field(&record, 1, "type", line)?
                .parse()
                .map_err(|e| row_error(line, e))?;
            let last_dividend =
                stock::parse_amount("last dividend", field(&record, 2, "last_dividend", line)?)
                    .map_err(|e| row_error(line, e))?;
            let fixed_dividend = stock::parse_fixed_dividend(record.get(3).unwrap_or(""))
                .map_err(|e| row_error(line, e))?;
            let par_value =
                stock::parse_amount("par value", field(&record, 4, "par_value", line)?)
                    .map_err(|e| row_error(line, e))?;

            definitions.push(StockDefinition {
                symbol,
                kind,
                par_value,
                last_dividend,
                fixed_dividend,
            });
        }

        Ok(definitions)
    }

    pub fn parse_trades(content: &str) -> Result<Vec<TradeRequest>, ExchangeError> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(content.as_bytes());
        let mut requests = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| ExchangeError::DataSource {
                reason: format!("CSV parse error: {}", e),
            })?;
            let line = line_of(&record);

            let symbol = field(&record, 0, "symbol", line)?.trim().to_string();
            let side: Side = field(&record, 1, "side", line)?
                .parse()
                .map_err(|e| row_error(line, e))?;
            let price: f64 = field(&record, 2, "price", line)?
                .trim()
                .parse()
                .map_err(|e| ExchangeError::DataSource {
                    reason: format!("line {}: invalid price value: {}", line, e),
                })?;
            let quantity: u64 = field(&record, 3, "quantity", line)?
                .trim()
                .parse()
                .map_err(|e| ExchangeError::DataSource {
                    reason: format!("line {}: invalid quantity value: {}", line, e),
                })?;
            let requested_at = match record.get(4).map(str::trim).filter(|s| !s.is_empty()) {
                Some(raw) => Some(
                    DateTime::parse_from_rfc3339(raw)
                        .map_err(|e| ExchangeError::DataSource {
                            reason: format!("line {}: invalid timestamp '{}': {}", line, raw, e),
                        })?
                        .with_timezone(&Utc),
                ),
                None => None,
            };

            requests.push(TradeRequest {
                symbol,
                side,
                price,
                quantity,
                requested_at,
            });
        }

        Ok(requests)
    }
}

impl StockSourcePort for CsvAdapter {
    fn load_stocks(&self) -> Result<Vec<StockDefinition>, ExchangeError> {
        match &self.stocks_path {
            Some(path) => Self::parse_stocks(&read(path)?),
            None => Self::parse_stocks(DEFAULT_STOCKS_CSV),
        }
    }

    fn load_trades(&self) -> Result<Vec<TradeRequest>, ExchangeError> {
        match &self.trades_path {
            Some(path) => Self::parse_trades(&read(path)?),
            None => Ok(Vec::new()),
        }
    }
}

fn read(path: &Path) -> Result<String, ExchangeError> {
    fs::read_to_string(path).map_err(|e| ExchangeError::DataSource {
        reason: format!("failed to read {}: {}", path.display(), e),
    })
}

fn line_of(record: &csv::StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

fn field<'r>(
    record: &'r csv::StringRecord,
    index: usize,
    name: &str,
    line: u64,
) -> Result<&'r str, ExchangeError> {
    record.get(index).ok_or_else(|| ExchangeError::DataSource {
        reason: format!("line {}: missing {} column", line, name),
    })
}

fn row_error(line: u64, err: ExchangeError) -> ExchangeError {
    ExchangeError::DataSource {
        reason: format!("line {}: {}", line, err),
    }
}

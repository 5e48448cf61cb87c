#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use gbce::adapters::clock::ManualClock;
use gbce::adapters::csv_adapter::{CsvAdapter, DEFAULT_STOCKS_CSV};
use gbce::domain::error::ExchangeError;
use gbce::domain::exchange::Exchange;
use gbce::domain::stock::StockDefinition;
use gbce::domain::trade::TradeRequest;
use gbce::ports::stock_source_port::StockSourcePort;
use std::io::Write;
use std::sync::Arc;

pub struct MockStockSource {
    pub stocks: Vec<StockDefinition>,
    pub trades: Vec<TradeRequest>,
    pub error: Option<String>,
}

impl MockStockSource {
    pub fn new() -> Self {
        Self {
            stocks: Vec::new(),
            trades: Vec::new(),
            error: None,
        }
    }

    pub fn with_stock(mut self, definition: StockDefinition) -> Self {
        self.stocks.push(definition);
        self
    }

    pub fn with_trade(mut self, request: TradeRequest) -> Self {
        self.trades.push(request);
        self
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl StockSourcePort for MockStockSource {
    fn load_stocks(&self) -> Result<Vec<StockDefinition>, ExchangeError> {
        if let Some(reason) = &self.error {
            return Err(ExchangeError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self.stocks.clone())
    }

    fn load_trades(&self) -> Result<Vec<TradeRequest>, ExchangeError> {
        Ok(self.trades.clone())
    }
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(start()))
}

pub fn gbce_definitions() -> Vec<StockDefinition> {
    CsvAdapter::parse_stocks(DEFAULT_STOCKS_CSV).unwrap()
}

/// The five-stock GBCE sample exchange on a manual clock.
pub fn gbce_exchange() -> (Exchange, Arc<ManualClock>) {
    let clock = manual_clock();
    let exchange = Exchange::from_definitions(gbce_definitions(), clock.clone()).unwrap();
    (exchange, clock)
}

pub fn write_temp(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

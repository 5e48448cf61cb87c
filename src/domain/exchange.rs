//! The exchange registry: owns every stock, routes trades, computes the index.
//!
//! The registry assumes a single writer. Mutating calls take `&mut self`, so
//! sharing one across threads requires an outer lock, which also gives
//! [`Exchange::all_share_index`] a consistent view of every trade history.

use crate::domain::error::ExchangeError;
use crate::domain::stock::{self, Stock, StockDefinition, DEFAULT_VWSP_WINDOW_MINUTES};
use crate::domain::trade::{Side, Trade, TradeRequest};
use crate::ports::clock_port::Clock;
use chrono::Duration;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct Exchange {
    stocks: BTreeMap<String, Stock>,
    clock: Arc<dyn Clock>,
    window: Duration,
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange")
            .field("stocks", &self.stocks)
            .field("window", &self.window)
            .finish()
    }
}

impl Exchange {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Exchange {
            stocks: BTreeMap::new(),
            clock,
            window: Duration::minutes(DEFAULT_VWSP_WINDOW_MINUTES),
        }
    }

    /// Sets the trailing VWSP window for stocks registered from now on.
    pub fn with_window(mut self, window: Duration) -> Result<Self, ExchangeError> {
        stock::validate_window(window)?;
        self.window = window;
        Ok(self)
    }

    /// Builds a registry seeded from `definitions`, in order.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = StockDefinition>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ExchangeError> {
        let mut exchange = Exchange::new(clock);
        exchange.add_stocks(definitions)?;
        Ok(exchange)
    }

    pub fn add_stocks(
        &mut self,
        definitions: impl IntoIterator<Item = StockDefinition>,
    ) -> Result<(), ExchangeError> {
        for definition in definitions {
            self.add_stock(definition)?;
        }
        Ok(())
    }

    pub fn add_stock(&mut self, definition: StockDefinition) -> Result<&Stock, ExchangeError> {
        if self.stocks.contains_key(&definition.symbol) {
            return Err(ExchangeError::Conflict {
                symbol: definition.symbol,
            });
        }
        let stock = Stock::with_window(definition, self.clock.clone(), self.window)?;
        let symbol = stock.symbol().to_string();
        tracing::debug!(%symbol, kind = %stock.kind(), "stock registered");
        Ok(self.stocks.entry(symbol).or_insert(stock))
    }

    /// Removes a stock together with its whole trade history.
    pub fn remove_stock(&mut self, symbol: &str) -> Result<Stock, ExchangeError> {
        let stock = self
            .stocks
            .remove(symbol)
            .ok_or_else(|| ExchangeError::not_found(symbol))?;
        tracing::debug!(
            symbol,
            trades = stock.trades().len(),
            "stock removed"
        );
        Ok(stock)
    }

    pub fn get_stock(&self, symbol: &str) -> Result<&Stock, ExchangeError> {
        self.stocks
            .get(symbol)
            .ok_or_else(|| ExchangeError::not_found(symbol))
    }

    fn get_stock_mut(&mut self, symbol: &str) -> Result<&mut Stock, ExchangeError> {
        self.stocks
            .get_mut(symbol)
            .ok_or_else(|| ExchangeError::not_found(symbol))
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.stocks.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.stocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stocks.is_empty()
    }

    /// Registered symbols in ascending order.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.stocks.keys().map(String::as_str)
    }

    pub fn stocks(&self) -> impl Iterator<Item = &Stock> {
        self.stocks.values()
    }

    pub fn buy(&mut self, symbol: &str, price: f64, quantity: u64) -> Result<&Trade, ExchangeError> {
        self.record_trade(symbol, price, quantity, Side::Buy)
    }

    pub fn sell(&mut self, symbol: &str, price: f64, quantity: u64) -> Result<&Trade, ExchangeError> {
        self.record_trade(symbol, price, quantity, Side::Sell)
    }

    pub fn record_trade(
        &mut self,
        symbol: &str,
        price: f64,
        quantity: u64,
        side: Side,
    ) -> Result<&Trade, ExchangeError> {
        self.get_stock_mut(symbol)?
            .record_trade(price, quantity, side)
    }

    pub fn apply(&mut self, request: &TradeRequest) -> Result<&Trade, ExchangeError> {
        self.record_trade(
            &request.symbol,
            request.price,
            request.quantity,
            request.side,
        )
    }

    pub fn dividend_yield(&self, symbol: &str, price: f64) -> Result<f64, ExchangeError> {
        self.get_stock(symbol)?.dividend_yield(price)
    }

    pub fn pe_ratio(&self, symbol: &str, price: f64) -> Result<f64, ExchangeError> {
        self.get_stock(symbol)?.pe_ratio(price)
    }

    /// Default-window VWSP of every registered stock, by symbol.
    pub fn volume_weighted_prices(&self) -> Result<Vec<(&str, f64)>, ExchangeError> {
        self.stocks
            .iter()
            .map(|(symbol, stock)| {
                stock
                    .volume_weighted_price()
                    .map(|price| (symbol.as_str(), price))
            })
            .collect()
    }

    /// Geometric mean of every stock's default-window VWSP.
    ///
    /// Zero when there are no stocks or when any stock has no trades in its
    /// window, since the product then contains a zero factor.
    pub fn all_share_index(&self) -> Result<f64, ExchangeError> {
        let prices: Vec<f64> = self
            .volume_weighted_prices()?
            .into_iter()
            .map(|(_, price)| price)
            .collect();
        let index = geometric_mean(&prices);
        tracing::debug!(stocks = prices.len(), index, "all share index computed");
        Ok(index)
    }
}

/// n-th root of the product of `values`; 0 for an empty slice or any zero value.
///
/// Sums logarithms instead of multiplying so large products cannot overflow.
pub fn geometric_mean(values: &[f64]) -> f64 {
    if values.is_empty() || values.iter().any(|v| *v <= 0.0) {
        return 0.0;
    }
    let log_sum: f64 = values.iter().map(|v| v.ln()).sum();
    (log_sum / values.len() as f64).exp()
}

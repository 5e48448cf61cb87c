//! Trade records, trade requests and time windows over trade history.

use crate::domain::error::ExchangeError;
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

impl FromStr for Side {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            other => Err(ExchangeError::validation(format!(
                "trade side must be buy or sell, got '{other}'"
            ))),
        }
    }
}

/// A recorded trade. Immutable once created; owned by its stock's history.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    symbol: String,
    price: f64,
    quantity: u64,
    side: Side,
    timestamp: DateTime<Utc>,
}

impl Trade {
    pub fn new(
        symbol: &str,
        price: f64,
        quantity: u64,
        side: Side,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, ExchangeError> {
        validate_price(price)?;
        if quantity == 0 {
            return Err(ExchangeError::validation("quantity should be > 0"));
        }
        if !(price * quantity as f64).is_finite() {
            return Err(ExchangeError::validation(format!(
                "notional of {quantity} at {price} is out of range"
            )));
        }
        Ok(Trade {
            symbol: symbol.to_string(),
            price,
            quantity,
            side,
            timestamp,
        })
    }

    /// Symbol of the stock this trade was recorded against.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn notional(&self) -> f64 {
        self.price * self.quantity as f64
    }
}

/// One `(symbol, price, quantity, side)` request from an external source.
///
/// `requested_at` is informational: the recorded trade is stamped by the
/// exchange clock, which a replay may set to this instant first.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRequest {
    pub symbol: String,
    pub side: Side,
    pub price: f64,
    pub quantity: u64,
    pub requested_at: Option<DateTime<Utc>>,
}

/// Inclusive `[start, end]` interval over trade timestamps. `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ExchangeError> {
        if start >= end {
            return Err(ExchangeError::validation(format!(
                "window start {start} should be before end {end}"
            )));
        }
        Ok(TimeWindow { start, end })
    }

    /// The `length` leading up to and including `end`.
    pub fn trailing(end: DateTime<Utc>, length: Duration) -> Result<Self, ExchangeError> {
        let start = end.checked_sub_signed(length).ok_or_else(|| {
            ExchangeError::validation(format!("window of {length} before {end} is out of range"))
        })?;
        Self::new(start, end)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

pub(crate) fn validate_price(price: f64) -> Result<(), ExchangeError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(ExchangeError::validation(format!(
            "price should be > 0, got {price}"
        )));
    }
    Ok(())
}

/// `Σ(price * quantity) / Σ(quantity)`, or 0 when no quantity was traded.
pub fn volume_weighted_price<'a>(trades: impl IntoIterator<Item = &'a Trade>) -> f64 {
    let (notional, volume) = trades
        .into_iter()
        .fold((0.0_f64, 0.0_f64), |(notional, volume), t| {
            (notional + t.notional(), volume + t.quantity as f64)
        });
    if volume > 0.0 { notional / volume } else { 0.0 }
}

//! Stock definition and trade request source port trait.

use crate::domain::error::ExchangeError;
use crate::domain::stock::StockDefinition;
use crate::domain::trade::TradeRequest;

pub trait StockSourcePort {
    /// Stock definitions in source order.
    fn load_stocks(&self) -> Result<Vec<StockDefinition>, ExchangeError>;

    /// Trade requests in source order. Sources without trades return an empty list.
    fn load_trades(&self) -> Result<Vec<TradeRequest>, ExchangeError> {
        Ok(Vec::new())
    }
}

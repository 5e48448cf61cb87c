//! Time source port trait.

use chrono::{DateTime, Utc};

/// Supplies the current instant to trade recording and default-window queries.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

//! Port traits at the domain's I/O seams.

pub mod clock_port;
pub mod config_port;
pub mod stock_source_port;

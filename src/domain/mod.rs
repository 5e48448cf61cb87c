//! Core domain types and logic.

pub mod trade;
pub mod stock;
pub mod exchange;
pub mod config_validation;
pub mod error;

//! Configuration validation.
//!
//! Checks every exchange config field before any stock is loaded.

use crate::domain::error::ExchangeError;
use crate::domain::stock::MAX_VWSP_WINDOW_MINUTES;
use crate::ports::config_port::ConfigPort;

pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

pub fn validate_exchange_config(config: &dyn ConfigPort) -> Result<(), ExchangeError> {
    validate_path(config, "stocks")?;
    validate_path(config, "trades")?;
    validate_window(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validate_path(config: &dyn ConfigPort, key: &str) -> Result<(), ExchangeError> {
    match config.get_string("exchange", key) {
        Some(s) if s.trim().is_empty() => Err(ExchangeError::ConfigInvalid {
            section: "exchange".to_string(),
            key: key.to_string(),
            reason: format!("{} must not be empty when present", key),
        }),
        _ => Ok(()),
    }
}

fn validate_window(config: &dyn ConfigPort) -> Result<(), ExchangeError> {
    let invalid = |reason: String| ExchangeError::ConfigInvalid {
        section: "exchange".to_string(),
        key: "vwsp_window_minutes".to_string(),
        reason,
    };
    match config.get_int("exchange", "vwsp_window_minutes") {
        Err(e) => Err(invalid(e)),
        Ok(Some(minutes)) if minutes <= 0 => Err(invalid(
            "vwsp_window_minutes must be positive".to_string(),
        )),
        Ok(Some(minutes)) if minutes > MAX_VWSP_WINDOW_MINUTES => Err(invalid(format!(
            "vwsp_window_minutes must be at most {MAX_VWSP_WINDOW_MINUTES}"
        ))),
        Ok(_) => Ok(()),
    }
}

fn validate_log_level(config: &dyn ConfigPort) -> Result<(), ExchangeError> {
    match config.get_string("log", "level") {
        Some(level) if !LOG_LEVELS.contains(&level.trim().to_lowercase().as_str()) => {
            Err(ExchangeError::ConfigInvalid {
                section: "log".to_string(),
                key: "level".to_string(),
                reason: format!("level must be one of {}", LOG_LEVELS.join(", ")),
            })
        }
        _ => Ok(()),
    }
}

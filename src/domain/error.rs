//! Domain error types.

/// Top-level error type for gbce.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("validation error: {reason}")]
    Validation { reason: String },

    #[error("stock {symbol} is already registered")]
    Conflict { symbol: String },

    #[error("stock {symbol} does not exist")]
    NotFound { symbol: String },

    #[error("invalid operation: {reason}")]
    InvalidOperation { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ExchangeError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        ExchangeError::Validation {
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(symbol: &str) -> Self {
        ExchangeError::NotFound {
            symbol: symbol.to_string(),
        }
    }

    /// Process exit status reported by the CLI for this error.
    pub fn exit_status(&self) -> u8 {
        match self {
            ExchangeError::Io(_) => 1,
            ExchangeError::ConfigParse { .. }
            | ExchangeError::ConfigMissing { .. }
            | ExchangeError::ConfigInvalid { .. } => 2,
            ExchangeError::DataSource { .. } => 3,
            ExchangeError::Validation { .. } | ExchangeError::InvalidOperation { .. } => 4,
            ExchangeError::Conflict { .. } | ExchangeError::NotFound { .. } => 5,
        }
    }
}

impl From<&ExchangeError> for std::process::ExitCode {
    fn from(err: &ExchangeError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_symbol() {
        let err = ExchangeError::Conflict {
            symbol: "ALE".into(),
        };
        assert_eq!(err.to_string(), "stock ALE is already registered");
        assert_eq!(
            ExchangeError::not_found("EEE").to_string(),
            "stock EEE does not exist"
        );
    }

    #[test]
    fn exit_status_groups_by_category() {
        let cases = [
            (ExchangeError::validation("price should be > 0"), 4),
            (
                ExchangeError::InvalidOperation {
                    reason: "not preferred".into(),
                },
                4,
            ),
            (ExchangeError::not_found("X"), 5),
            (
                ExchangeError::DataSource {
                    reason: "bad row".into(),
                },
                3,
            ),
            (
                ExchangeError::ConfigMissing {
                    section: "exchange".into(),
                    key: "stocks".into(),
                },
                2,
            ),
            (std::io::Error::other("disk").into(), 1),
        ];
        for (err, expected) in cases {
            assert_eq!(err.exit_status(), expected, "{err}");
        }
    }
}

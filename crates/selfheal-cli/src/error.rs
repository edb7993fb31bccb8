//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// No ledger entry with the requested id
    #[error("No healing event with id {id}")]
    EventNotFound {
        /// Requested id
        id: String,
    },

    /// Ledger file does not exist
    #[error("Ledger not found: {path}")]
    LedgerNotFound {
        /// Path that was checked
        path: String,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Selfheal library error
    #[error("Selfheal error: {0}")]
    Heal(#[from] selfheal::HealError),
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing-event error
    #[must_use]
    pub fn event_not_found(id: impl Into<String>) -> Self {
        Self::EventNotFound { id: id.into() }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = CliError::config("bad config");
        assert!(err.to_string().contains("Configuration"));
        assert!(err.to_string().contains("bad config"));
    }

    #[test]
    fn test_event_not_found_error() {
        let err = CliError::event_not_found("HEAL-00000000");
        assert_eq!(err.to_string(), "No healing event with id HEAL-00000000");
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cli_err: CliError = io_err.into();
        assert!(cli_err.to_string().contains("I/O"));
    }

    #[test]
    fn test_heal_error_from() {
        let err: CliError = selfheal::HealError::config("no key").into();
        assert!(err.to_string().starts_with("Selfheal error"));
    }
}

//! Result and error types for Selfheal.

use thiserror::Error;

/// Result type for Selfheal operations
pub type HealResult<T> = Result<T, HealError>;

/// Failures reported by the browser engine for a single operation.
///
/// Only [`EngineError::Timeout`] is healable: it means the locator did not
/// resolve to an actionable element before the engine's deadline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Locator did not resolve within the engine's deadline
    #[error("{message}")]
    Timeout {
        /// Engine error text, e.g. `Locator.click: Timeout 5000ms exceeded.`
        message: String,
    },

    /// Any other action failure (element detached, not editable, ...)
    #[error("{message}")]
    Action {
        /// Engine error text
        message: String,
    },

    /// Navigation or page-level failure
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },
}

impl EngineError {
    /// Create a timeout failure
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a non-healable action failure
    #[must_use]
    pub fn action(message: impl Into<String>) -> Self {
        Self::Action {
            message: message.into(),
        }
    }

    /// Whether this failure may be healed by proposing a new locator
    #[must_use]
    pub const fn is_healable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Error class name recorded in the healing ledger
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "TimeoutError",
            Self::Action { .. } => "ActionError",
            Self::Navigation { .. } => "NavigationError",
        }
    }
}

/// Errors that can occur in Selfheal
#[derive(Debug, Error)]
pub enum HealError {
    /// Browser engine failure, passed through unchanged
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Provider name not in the registry
    #[error("Unknown provider: {name}. Choose from: {choices}")]
    UnknownProvider {
        /// Name that was requested
        name: String,
        /// Comma-separated list of recognised names
        choices: String,
    },

    /// Provider requires a credential that was not supplied
    #[error("{variables} is required for the {provider} provider")]
    MissingCredential {
        /// Provider name
        provider: String,
        /// Environment variables that could have supplied it
        variables: String,
    },

    /// Invalid configuration value
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Engine returned an output the typed call cannot accept
    #[error("Unexpected output from '{action}' on '{descriptor}'")]
    UnexpectedOutput {
        /// Action name
        action: &'static str,
        /// Locator descriptor the action ran against
        descriptor: String,
    },

    /// Ledger file could not be locked
    #[error("Ledger lock failed: {message}")]
    LedgerLock {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HealError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// The engine failure carried by this error, if any
    #[must_use]
    pub const fn engine_error(&self) -> Option<&EngineError> {
        match self {
            Self::Engine(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_timeout_is_healable() {
        assert!(EngineError::timeout("Timeout 5000ms exceeded").is_healable());
        assert!(!EngineError::action("element is not editable").is_healable());
        assert!(!EngineError::Navigation {
            url: "https://example.com".to_string(),
            message: "net::ERR".to_string(),
        }
        .is_healable());
    }

    #[test]
    fn test_engine_error_displays_original_text() {
        let err = HealError::from(EngineError::timeout("Locator.click: Timeout 5000ms exceeded."));
        assert_eq!(err.to_string(), "Locator.click: Timeout 5000ms exceeded.");
    }

    #[test]
    fn test_unknown_provider_message() {
        let err = HealError::UnknownProvider {
            name: "bard".to_string(),
            choices: "gemini, openai".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unknown provider: bard. Choose from: gemini, openai"
        );
    }

    #[test]
    fn test_missing_credential_names_variables() {
        let err = HealError::MissingCredential {
            provider: "openai".to_string(),
            variables: "OPENAI_API_KEY".to_string(),
        };
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}

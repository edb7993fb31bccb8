//! Configuration for providers and the healing session.
//!
//! Environment lookup happens only in the `from_env` constructors. Everything
//! below them takes explicit values, so tests can resolve a configuration
//! from a plain map without touching the process environment.

use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::provider::ProviderKind;
use crate::result::{HealError, HealResult};

/// Provider used when neither an explicit name nor `AI_PROVIDER` is given
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Default ledger file, relative to the working directory
pub const DEFAULT_LEDGER_PATH: &str = "healing_report.json";

/// Page snapshot characters included in a healing prompt
pub const DEFAULT_SNAPSHOT_LIMIT: usize = 20_000;

/// Page snapshot characters kept in a ledger entry
pub const DEFAULT_EXCERPT_LIMIT: usize = 5_000;

/// Confidence recorded for heuristic AI healing
pub const DEFAULT_CONFIDENCE: f64 = 0.85;

/// Environment variable naming the default provider
pub const PROVIDER_ENV: &str = "AI_PROVIDER";

/// Environment variable overriding the ledger path
pub const LEDGER_ENV: &str = "SELFHEAL_LEDGER";

/// Immutable provider selection, fixed at healer construction.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Which adapter to construct
    pub kind: ProviderKind,
    /// Credential (not needed for Ollama)
    pub api_key: Option<SecretString>,
    /// Model or deployment name
    pub model: String,
    /// Endpoint override (Azure endpoint, Ollama base URL, test servers)
    pub endpoint: Option<String>,
    /// API version (Azure only)
    pub api_version: Option<String>,
}

impl ProviderConfig {
    /// Create a config for `kind` with its default model
    #[must_use]
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            api_key: None,
            model: kind.default_model().to_string(),
            endpoint: None,
            api_version: None,
        }
    }

    /// Set the API key
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::new(key.into()));
        self
    }

    /// Set the model name
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the API version
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// The API key, if one is set and non-empty
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_ref()
            .map(|k| k.expose_secret().as_str())
            .filter(|k| !k.is_empty())
    }

    /// Resolve a configuration from explicit values, falling back to `env`.
    ///
    /// Precedence for the provider name is: explicit argument, then
    /// `AI_PROVIDER`, then [`DEFAULT_PROVIDER`]. Keys and models follow the
    /// same explicit-then-environment order per provider.
    ///
    /// # Errors
    ///
    /// Returns [`HealError::UnknownProvider`] for an unrecognised name and
    /// [`HealError::MissingCredential`] when the chosen provider needs a key
    /// (or endpoint) that neither source supplies.
    pub fn resolve<F>(
        provider: Option<&str>,
        api_key: Option<&str>,
        model: Option<&str>,
        env: F,
    ) -> HealResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let name = provider
            .map(str::to_string)
            .or_else(|| lookup(PROVIDER_ENV))
            .unwrap_or_else(|| DEFAULT_PROVIDER.to_string());
        let kind: ProviderKind = name.parse()?;

        let key = api_key
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .or_else(|| kind.key_vars().iter().find_map(|var| lookup(*var)));
        let endpoint = kind.endpoint_var().and_then(|var| lookup(var));

        match kind {
            ProviderKind::AzureOpenAi if key.is_none() || endpoint.is_none() => {
                return Err(HealError::MissingCredential {
                    provider: kind.as_str().to_string(),
                    variables: "AZURE_OPENAI_API_KEY and AZURE_OPENAI_ENDPOINT".to_string(),
                });
            }
            _ if kind.requires_key() && key.is_none() => {
                return Err(kind.missing_credential());
            }
            _ => {}
        }

        let model = model
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .or_else(|| lookup(kind.model_var()))
            .unwrap_or_else(|| kind.default_model().to_string());

        let api_version = match kind {
            ProviderKind::AzureOpenAi => Some(
                lookup("AZURE_OPENAI_API_VERSION")
                    .unwrap_or_else(|| crate::provider::azure::DEFAULT_API_VERSION.to_string()),
            ),
            _ => None,
        };

        debug!(provider = kind.as_str(), model = %model, "resolved provider config");

        Ok(Self {
            kind,
            api_key: key.map(SecretString::new),
            model,
            endpoint,
            api_version,
        })
    }

    /// Resolve against the process environment (after loading `.env`).
    pub fn from_env(
        provider: Option<&str>,
        api_key: Option<&str>,
        model: Option<&str>,
    ) -> HealResult<Self> {
        load_dotenv();
        Self::resolve(provider, api_key, model, |key| std::env::var(key).ok())
    }
}

/// Session settings for a healing page.
#[derive(Debug, Clone)]
pub struct HealConfig {
    /// Ledger JSON file
    pub ledger_path: PathBuf,
    /// Snapshot characters sent to the provider
    pub snapshot_limit: usize,
    /// Snapshot characters stored with each ledger entry
    pub excerpt_limit: usize,
    /// Confidence recorded for each heal
    pub confidence: f64,
}

impl Default for HealConfig {
    fn default() -> Self {
        Self {
            ledger_path: PathBuf::from(DEFAULT_LEDGER_PATH),
            snapshot_limit: DEFAULT_SNAPSHOT_LIMIT,
            excerpt_limit: DEFAULT_EXCERPT_LIMIT,
            confidence: DEFAULT_CONFIDENCE,
        }
    }
}

impl HealConfig {
    /// Create new config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with `SELFHEAL_LEDGER` applied after loading `.env`
    #[must_use]
    pub fn from_env() -> Self {
        load_dotenv();
        Self::resolve(|key| std::env::var(key).ok())
    }

    /// Defaults, with overrides taken from `env`
    #[must_use]
    pub fn resolve<F>(env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(path) = env(LEDGER_ENV).filter(|p| !p.is_empty()) {
            config.ledger_path = PathBuf::from(path);
        }
        config
    }

    /// Set the ledger path
    #[must_use]
    pub fn ledger_path(mut self, path: impl AsRef<Path>) -> Self {
        self.ledger_path = path.as_ref().to_path_buf();
        self
    }

    /// Set the prompt snapshot limit
    #[must_use]
    pub const fn snapshot_limit(mut self, limit: usize) -> Self {
        self.snapshot_limit = limit;
        self
    }

    /// Set the ledger excerpt limit
    #[must_use]
    pub const fn excerpt_limit(mut self, limit: usize) -> Self {
        self.excerpt_limit = limit;
        self
    }

    /// Set the recorded confidence
    #[must_use]
    pub const fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }
}

/// Load a `.env` file from the working directory or its parents, if any.
pub fn load_dotenv() {
    if let Ok(path) = dotenvy::dotenv() {
        debug!(path = %path.display(), "loaded .env");
    }
}

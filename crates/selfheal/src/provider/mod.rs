//! Text-generation providers.
//!
//! Every backend implements one capability, [`TextGenerator::generate`]:
//! a prompt in, text or `None` out. Transport, auth and decoding failures
//! are logged inside the adapter and surface only as `None`.
//!
//! Adapters:
//! - **Gemini**: Google Generative Language API
//! - **OpenAI**: chat completions
//! - **Anthropic**: messages API
//! - **Azure OpenAI**: chat completions on a named deployment
//! - **Ollama**: locally hosted model server

pub mod anthropic;
pub mod azure;
pub mod gemini;
pub mod ollama;
pub mod openai;

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::config::ProviderConfig;
use crate::result::{HealError, HealResult};

pub use anthropic::AnthropicProvider;
pub use azure::AzureOpenAiProvider;
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

/// Maximum tokens requested from vendors that require a limit
pub const MAX_TOKENS: u32 = 500;

/// System instruction for chat-style vendors
pub const SYSTEM_PROMPT: &str = "You are a test automation expert.";

/// The single capability the healer consumes.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`, or `None` if generation failed
    async fn generate(&self, prompt: &str) -> Option<String>;
}

/// Closed set of built-in providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Google Gemini
    Gemini,
    /// OpenAI chat completions
    OpenAi,
    /// Anthropic messages
    Anthropic,
    /// Azure-hosted OpenAI deployment
    AzureOpenAi,
    /// Local Ollama server
    Ollama,
}

/// Recognised names, in the order they are listed to the user
pub const PROVIDER_NAMES: &[(&str, ProviderKind)] = &[
    ("gemini", ProviderKind::Gemini),
    ("google", ProviderKind::Gemini),
    ("openai", ProviderKind::OpenAi),
    ("anthropic", ProviderKind::Anthropic),
    ("claude", ProviderKind::Anthropic),
    ("azure", ProviderKind::AzureOpenAi),
    ("azure_openai", ProviderKind::AzureOpenAi),
    ("ollama", ProviderKind::Ollama),
    ("local", ProviderKind::Ollama),
];

impl ProviderKind {
    /// All providers
    pub const ALL: [Self; 5] = [
        Self::Gemini,
        Self::OpenAi,
        Self::Anthropic,
        Self::AzureOpenAi,
        Self::Ollama,
    ];

    /// Canonical name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::AzureOpenAi => "azure_openai",
            Self::Ollama => "ollama",
        }
    }

    /// Environment variables consulted for the API key, in order
    #[must_use]
    pub const fn key_vars(self) -> &'static [&'static str] {
        match self {
            Self::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            Self::OpenAi => &["OPENAI_API_KEY"],
            Self::Anthropic => &["ANTHROPIC_API_KEY"],
            Self::AzureOpenAi => &["AZURE_OPENAI_API_KEY"],
            Self::Ollama => &[],
        }
    }

    /// Environment variable for the model name
    #[must_use]
    pub const fn model_var(self) -> &'static str {
        match self {
            Self::Gemini => "GEMINI_MODEL",
            Self::OpenAi => "OPENAI_MODEL",
            Self::Anthropic => "ANTHROPIC_MODEL",
            Self::AzureOpenAi => "AZURE_OPENAI_DEPLOYMENT",
            Self::Ollama => "OLLAMA_MODEL",
        }
    }

    /// Environment variable for the endpoint, where one applies
    #[must_use]
    pub const fn endpoint_var(self) -> Option<&'static str> {
        match self {
            Self::AzureOpenAi => Some("AZURE_OPENAI_ENDPOINT"),
            Self::Ollama => Some("OLLAMA_BASE_URL"),
            Self::Gemini | Self::OpenAi | Self::Anthropic => None,
        }
    }

    /// Model used when none is configured
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Gemini => "gemini-2.0-flash-lite-preview-02-05",
            Self::OpenAi => "gpt-4o-mini",
            Self::Anthropic => "claude-3-5-sonnet-20241022",
            Self::AzureOpenAi => "gpt-4",
            Self::Ollama => "llama3",
        }
    }

    /// Whether construction fails without an API key
    #[must_use]
    pub const fn requires_key(self) -> bool {
        !matches!(self, Self::Ollama)
    }

    /// The configuration error for a missing key
    #[must_use]
    pub fn missing_credential(self) -> HealError {
        HealError::MissingCredential {
            provider: self.as_str().to_string(),
            variables: self.key_vars().join(" or "),
        }
    }

    /// Comma-separated list of every recognised name
    #[must_use]
    pub fn choices() -> String {
        PROVIDER_NAMES
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = HealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        PROVIDER_NAMES
            .iter()
            .find(|(name, _)| *name == wanted)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| HealError::UnknownProvider {
                name: wanted,
                choices: Self::choices(),
            })
    }
}

/// Where the healer gets its generator from.
#[derive(Clone)]
pub enum ProviderSource {
    /// Build a built-in adapter from configuration
    Named(ProviderConfig),
    /// Use an already-constructed generator
    Instance(Arc<dyn TextGenerator>),
}

impl fmt::Debug for ProviderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(config) => f.debug_tuple("Named").field(config).finish(),
            Self::Instance(generator) => f.debug_tuple("Instance").field(&generator.name()).finish(),
        }
    }
}

impl From<ProviderConfig> for ProviderSource {
    fn from(config: ProviderConfig) -> Self {
        Self::Named(config)
    }
}

impl From<Arc<dyn TextGenerator>> for ProviderSource {
    fn from(generator: Arc<dyn TextGenerator>) -> Self {
        Self::Instance(generator)
    }
}

impl ProviderSource {
    /// Construct (or hand back) the generator.
    pub fn into_generator(self) -> HealResult<Arc<dyn TextGenerator>> {
        match self {
            Self::Named(config) => create_provider(&config),
            Self::Instance(generator) => Ok(generator),
        }
    }
}

/// Build the adapter selected by `config.kind`.
///
/// # Errors
///
/// Returns [`HealError::MissingCredential`] if the adapter needs a key or
/// endpoint that the config does not carry.
pub fn create_provider(config: &ProviderConfig) -> HealResult<Arc<dyn TextGenerator>> {
    let generator: Arc<dyn TextGenerator> = match config.kind {
        ProviderKind::Gemini => Arc::new(GeminiProvider::from_config(config)?),
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::from_config(config)?),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::from_config(config)?),
        ProviderKind::AzureOpenAi => Arc::new(AzureOpenAiProvider::from_config(config)?),
        ProviderKind::Ollama => Arc::new(OllamaProvider::from_config(config)),
    };
    Ok(generator)
}

/// Errors from a provider round trip. Never leave the adapter.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Server returned an error status.
    #[error("API error {status}: {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
    /// Response decoded but carried no usable text.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Send a request and decode a JSON body, mapping non-2xx to `ApiError`.
///
/// Transport errors are stripped of the request URL before they reach logs.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, ProviderError> {
    let resp = request.send().await.map_err(reqwest::Error::without_url)?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ProviderError::ApiError {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp.json().await.map_err(reqwest::Error::without_url)?)
}

/// Collapse a round-trip result into the capability's `Option`.
pub(crate) fn settle(provider: &str, result: Result<String, ProviderError>) -> Option<String> {
    match result {
        Ok(text) => Some(text.trim().to_string()),
        Err(e) => {
            warn!(provider, error = %e, "generation failed");
            None
        }
    }
}

/// Generator that replays queued responses. For tests and dry runs.
///
/// Each call to `generate` pops the next scripted response; an exhausted
/// script behaves like a failing provider.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Option<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    /// Create an empty script
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response
    #[must_use]
    pub fn respond(self, text: impl Into<String>) -> Self {
        self.lock_responses().push_back(Some(text.into()));
        self
    }

    /// Queue a failed generation
    #[must_use]
    pub fn fail(self) -> Self {
        self.lock_responses().push_back(None);
        self
    }

    /// Number of `generate` calls so far
    #[must_use]
    pub fn calls(&self) -> usize {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Prompts received so far
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<Option<String>>> {
        self.responses.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Option<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());
        self.lock_responses().pop_front().flatten()
    }
}

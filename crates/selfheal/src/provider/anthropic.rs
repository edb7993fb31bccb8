//! Anthropic messages API adapter.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::openai::Role;
use super::{send_json, settle, ProviderError, ProviderKind, TextGenerator, MAX_TOKENS};
use crate::config::ProviderConfig;
use crate::result::HealResult;

/// Public API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Value of the `anthropic-version` header
pub const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic provider.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    base_url: String,
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
}

impl AnthropicProvider {
    /// Create a provider against the public API
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
            api_key: SecretString::new(api_key.into()),
            model: model.into(),
        }
    }

    /// Build from a resolved configuration
    pub fn from_config(config: &ProviderConfig) -> HealResult<Self> {
        let key = config
            .api_key()
            .ok_or_else(|| ProviderKind::Anthropic.missing_credential())?;
        let provider = Self::new(key, config.model.clone());
        Ok(match &config.endpoint {
            Some(url) => provider.with_base_url(url),
            None => provider,
        })
    }

    /// Point at a different server
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn create_message(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            messages: [Message {
                role: Role::User,
                content: prompt,
            }],
        };
        let request = self
            .client
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(&body);
        let response: MessagesResponse = send_json(request).await?;
        response
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .find_map(|block| block.text)
            .ok_or_else(|| ProviderError::Malformed("no text block".to_string()))
    }
}

#[async_trait]
impl TextGenerator for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, prompt: &str) -> Option<String> {
        settle(self.name(), self.create_message(prompt).await)
    }
}

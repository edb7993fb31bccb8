//! Ollama adapter for a locally hosted model server.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{send_json, settle, ProviderError, TextGenerator};
use crate::config::ProviderConfig;

/// Default local server
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// System instruction sent with every request
pub const SYSTEM: &str = "You are a test automation expert. Return ONLY the locator string.";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    system: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Ollama provider. Needs no credential.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    base_url: String,
    client: reqwest::Client,
    model: String,
}

impl OllamaProvider {
    /// Create a provider for `model` on `base_url`
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            model: model.into(),
        }
    }

    /// Build from a configuration; any API key is ignored
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(
            config.endpoint.as_deref().unwrap_or(DEFAULT_BASE_URL),
            config.model.clone(),
        )
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn generate_once(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            system: SYSTEM,
        };
        let response: GenerateResponse = send_json(self.client.post(&url).json(&body)).await?;
        Ok(response.response)
    }
}

#[async_trait]
impl TextGenerator for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, prompt: &str) -> Option<String> {
        let result = self.generate_once(prompt).await;
        if result.is_err() {
            tracing::warn!(
                base_url = %self.base_url,
                model = %self.model,
                "ensure Ollama is running and the model is pulled"
            );
        }
        settle(self.name(), result)
    }
}

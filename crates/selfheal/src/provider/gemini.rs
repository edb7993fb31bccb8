//! Google Gemini adapter (Generative Language API, `generateContent`).

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{send_json, settle, ProviderError, ProviderKind, TextGenerator};
use crate::config::ProviderConfig;
use crate::result::HealResult;

/// Public API base URL
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn into_text(self) -> Result<String, ProviderError> {
        self.candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
            .ok_or_else(|| ProviderError::Malformed("no candidate text".to_string()))
    }
}

/// Gemini provider.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    base_url: String,
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
}

impl GeminiProvider {
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
            .ok_or_else(|| ProviderKind::Gemini.missing_credential())?;
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

    /// Returns the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn generate_content(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };
        let request = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret().as_str())
            .json(&body);
        let response: GenerateResponse = send_json(request).await?;
        response.into_text()
    }
}

#[async_trait]
impl TextGenerator for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> Option<String> {
        settle(self.name(), self.generate_content(prompt).await)
    }
}

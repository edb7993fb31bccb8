//! OpenAI chat completions adapter.
//!
//! Also hosts the chat types shared with the Azure deployment adapter,
//! which speaks the same request/response shape.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{send_json, settle, ProviderError, TextGenerator, MAX_TOKENS, SYSTEM_PROMPT};
use crate::config::ProviderConfig;
use crate::provider::ProviderKind;
use crate::result::HealResult;

/// Public API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Sampling temperature for locator suggestions
pub const TEMPERATURE: f64 = 0.3;

/// Chat message role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt
    System,
    /// User message
    User,
    /// Assistant response
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message author.
    pub role: Role,
    /// The content of the message.
    pub content: String,
}

/// Parameters for a chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model identifier (ignored by Azure, which routes by deployment).
    pub model: String,
    /// The messages for the chat completion.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Request used for every healing prompt
    #[must_use]
    pub fn healing(model: &str, prompt: &str) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: Role::System,
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: Role::User,
                    content: prompt.to_string(),
                },
            ],
            temperature: Some(TEMPERATURE),
            max_tokens: Some(MAX_TOKENS),
        }
    }
}

/// A single completion choice.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponseChoice {
    /// The generated message.
    pub message: ChatResponseMessage,
    /// Why generation stopped.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Assistant message inside a choice; content is null for refusals.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponseMessage {
    /// Generated text
    #[serde(default)]
    pub content: Option<String>,
}

/// Response from a chat completion endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    /// Unique identifier for this completion.
    #[serde(default)]
    pub id: String,
    /// Model used.
    #[serde(default)]
    pub model: String,
    /// Generated choices.
    pub choices: Vec<ChatResponseChoice>,
}

impl ChatResponse {
    /// Text of the first choice
    pub fn into_text(self) -> Result<String, ProviderError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Malformed("no choices with content".to_string()))
    }
}

/// OpenAI chat completions provider.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    base_url: String,
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
}

impl OpenAiProvider {
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
            .ok_or_else(|| ProviderKind::OpenAi.missing_credential())?;
        let provider = Self::new(key, config.model.clone());
        Ok(match &config.endpoint {
            Some(url) => provider.with_base_url(url),
            None => provider,
        })
    }

    /// Point at a different server (proxies, test servers)
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn chat_completion(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let request = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&ChatRequest::healing(&self.model, prompt));
        let response: ChatResponse = send_json(request).await?;
        response.into_text()
    }
}

#[async_trait]
impl TextGenerator for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, prompt: &str) -> Option<String> {
        settle(self.name(), self.chat_completion(prompt).await)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_client_strips_trailing_slash() {
        let provider = OpenAiProvider::new("sk", "gpt-4o-mini").with_base_url("http://localhost:8081/");
        assert_eq!(provider.base_url(), "http://localhost:8081");
        assert_eq!(provider.model(), "gpt-4o-mini");
    }

    #[test]
    fn test_healing_request_serialization() {
        let req = ChatRequest::healing("gpt-4o-mini", "find the button");
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"role\":\"system\""));
        assert!(json.contains("\"content\":\"find the button\""));
        assert!(json.contains("\"temperature\":0.3"));
        assert!(json.contains("\"max_tokens\":500"));
    }

    #[test]
    fn test_chat_response_deserialization() {
        let json = r##"{
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "#continue-btn"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"##;
        let resp: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.id, "chatcmpl-123");
        assert_eq!(resp.into_text().unwrap(), "#continue-btn");
    }

    #[test]
    fn test_empty_choices_is_malformed() {
        let resp: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(resp.into_text(), Err(ProviderError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_generate_against_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "choices": [{"index": 0, "message": {"role": "assistant", "content": " #continue-btn \n"}}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let provider = OpenAiProvider::new("sk-test", "gpt-4o-mini").with_base_url(server.url());
        let text = provider.generate("prompt").await;
        assert_eq!(text.as_deref(), Some("#continue-btn"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_becomes_none() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .with_body("invalid api key")
            .create_async()
            .await;

        let provider = OpenAiProvider::new("bad", "gpt-4o-mini").with_base_url(server.url());
        assert!(provider.generate("prompt").await.is_none());
    }
}

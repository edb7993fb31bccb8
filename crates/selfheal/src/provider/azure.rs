//! Azure OpenAI adapter: chat completions routed to a named deployment.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::openai::{ChatRequest, ChatResponse};
use super::{send_json, settle, ProviderError, TextGenerator};
use crate::config::ProviderConfig;
use crate::result::{HealError, HealResult};

/// API version used when `AZURE_OPENAI_API_VERSION` is unset
pub const DEFAULT_API_VERSION: &str = "2024-02-15-preview";

/// Azure OpenAI provider.
#[derive(Debug, Clone)]
pub struct AzureOpenAiProvider {
    endpoint: String,
    deployment: String,
    api_version: String,
    api_key: SecretString,
    client: reqwest::Client,
}

impl AzureOpenAiProvider {
    /// Create a provider for `deployment` on `endpoint`
    pub fn new(
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            deployment: deployment.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            api_key: SecretString::new(api_key.into()),
            client: reqwest::Client::new(),
        }
    }

    /// Build from a resolved configuration; key and endpoint are both required
    pub fn from_config(config: &ProviderConfig) -> HealResult<Self> {
        let (Some(key), Some(endpoint)) = (config.api_key(), config.endpoint.as_deref()) else {
            return Err(HealError::MissingCredential {
                provider: config.kind.as_str().to_string(),
                variables: "AZURE_OPENAI_API_KEY and AZURE_OPENAI_ENDPOINT".to_string(),
            });
        };
        let mut provider = Self::new(endpoint, config.model.clone(), key);
        if let Some(version) = &config.api_version {
            provider.api_version.clone_from(version);
        }
        Ok(provider)
    }

    /// Full completions URL for this deployment
    #[must_use]
    pub fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }

    async fn chat_completion(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = self
            .client
            .post(self.completions_url())
            .header("api-key", self.api_key.expose_secret())
            .json(&ChatRequest::healing(&self.deployment, prompt));
        let response: ChatResponse = send_json(request).await?;
        response.into_text()
    }
}

#[async_trait]
impl TextGenerator for AzureOpenAiProvider {
    fn name(&self) -> &str {
        "azure_openai"
    }

    async fn generate(&self, prompt: &str) -> Option<String> {
        settle(self.name(), self.chat_completion(prompt).await)
    }
}

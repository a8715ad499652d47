use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::config::AppConfig;

/// The outbound call is bounded; a hung provider becomes a timeout failure
/// that the worker captures as answer text.
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request timed out after {0:?}")]
    Timeout(Duration),
    #[error("provider request failed: {0}")]
    Api(String),
    #[error("provider returned no content")]
    EmptyResponse,
}

/// Seam between the worker and the external generation service. Blocking
/// network work happens only behind this trait, never on the request path.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Client for any OpenAI-compatible completion API.
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(config: &AppConfig) -> Self {
        let client = Client::with_config(
            OpenAIConfig::new()
                .with_api_key(&config.provider_api_key)
                .with_api_base(&config.provider_api_base),
        );
        Self {
            client,
            model: config.provider_model.clone(),
            timeout: PROVIDER_TIMEOUT,
        }
    }
}

#[async_trait]
impl GenerationProvider for OpenAiProvider {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| ProviderError::Api(e.to_string()))?
                .into()])
            .build()
            .map_err(|e| ProviderError::Api(e.to_string()))?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))?
            .map_err(|e| ProviderError::Api(e.to_string()))?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or(ProviderError::EmptyResponse)?;

        info!("provider answered {} chars", content.len());
        Ok(content)
    }
}

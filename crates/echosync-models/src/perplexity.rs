//! Perplexity provider implementation.
//!
//! Perplexity speaks the OpenAI chat completions format, so the request and
//! extraction logic is shared with [`crate::openai`].

use crate::factory::ProviderConfig;
use crate::http::build_client;
use crate::openai::send_chat_completion;
use async_trait::async_trait;
use echosync_abstraction::{
    CompletionRequest, ProviderCallable, ProviderError, ProviderId, ProviderResponse,
};
use reqwest::Client;
use tracing::debug;

/// Perplexity provider implementation.
#[derive(Debug, Clone)]
pub struct PerplexityProvider {
    config: ProviderConfig,
    api_key: String,
    client: Client,
}

impl PerplexityProvider {
    /// Creates a new `PerplexityProvider` with a custom configuration and API key.
    ///
    /// # Errors
    /// Returns a `ProviderError` if the HTTP client cannot be built.
    pub fn with_config(config: ProviderConfig, api_key: String) -> Result<Self, ProviderError> {
        let client = build_client(ProviderId::Perplexity, config.timeout)?;
        Ok(Self { config, api_key, client })
    }
}

#[async_trait]
impl ProviderCallable for PerplexityProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<ProviderResponse, ProviderError> {
        debug!(
            model_id = %self.config.model_id,
            message_len = request.message.len(),
            "PerplexityProvider generating chat completion"
        );

        send_chat_completion(
            &self.client,
            ProviderId::Perplexity,
            &self.config,
            &self.api_key,
            &request.chat_messages(),
        )
        .await
    }

    fn label(&self) -> &str {
        ProviderId::Perplexity.label()
    }
}

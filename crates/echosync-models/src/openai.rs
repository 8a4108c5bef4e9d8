//! OpenAI provider implementation.
//!
//! This module provides an implementation of the `ProviderCallable` trait for
//! OpenAI's chat completions API. The same wire format is reused by the
//! Perplexity adapter.

use crate::factory::ProviderConfig;
use crate::http::{build_client, map_decode_error, map_send_error, map_status_error};
use async_trait::async_trait;
use echosync_abstraction::{
    ChatMessage, CompletionRequest, ProviderCallable, ProviderError, ProviderId, ProviderResponse,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// OpenAI provider implementation.
#[derive(Debug, Clone)]
pub struct OpenAIProvider {
    /// Model, endpoint and timeout settings.
    config: ProviderConfig,
    /// The API key for authentication.
    api_key: String,
    /// HTTP client with the configured timeout.
    client: Client,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with a custom configuration and API key.
    ///
    /// # Errors
    /// Returns a `ProviderError` if the HTTP client cannot be built.
    pub fn with_config(config: ProviderConfig, api_key: String) -> Result<Self, ProviderError> {
        let client = build_client(ProviderId::OpenAI, config.timeout)?;
        Ok(Self { config, api_key, client })
    }

    /// Converts our ChatMessage role to OpenAI API role format.
    fn role_to_openai(role: &str) -> String {
        match role {
            "assistant" => "assistant".to_string(),
            "system" => "system".to_string(),
            "user" => "user".to_string(),
            _ => role.to_string(),
        }
    }
}

/// Sends one chat completion in the OpenAI wire format and extracts
/// `choices[0].message.content`.
pub(crate) async fn send_chat_completion(
    client: &Client,
    provider: ProviderId,
    config: &ProviderConfig,
    api_key: &str,
    messages: &[ChatMessage],
) -> Result<ProviderResponse, ProviderError> {
    let url = format!("{}/chat/completions", config.base_url);

    let request_body = OpenAIRequest {
        model: config.model_id.clone(),
        messages: messages
            .iter()
            .map(|msg| OpenAIMessage {
                role: OpenAIProvider::role_to_openai(&msg.role),
                content: Some(msg.content.clone()),
            })
            .collect(),
        max_tokens: config.max_tokens,
        temperature: config.temperature,
    };

    let response = client
        .post(&url)
        .bearer_auth(api_key)
        .json(&request_body)
        .send()
        .await
        .map_err(|e| map_send_error(provider, config.timeout, e))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
        return Err(map_status_error(provider, status, error_text));
    }

    let openai_response: OpenAIResponse =
        response.json().await.map_err(|e| map_decode_error(provider, e))?;

    let content = openai_response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| {
            error!(provider = %provider, "No content in chat completion response");
            ProviderError::ResponseError("No content in API response".to_string())
        })?;

    Ok(ProviderResponse { content, model_id: openai_response.model.or_else(|| Some(config.model_id.clone())) })
}

#[async_trait]
impl ProviderCallable for OpenAIProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<ProviderResponse, ProviderError> {
        debug!(
            model_id = %self.config.model_id,
            message_len = request.message.len(),
            "OpenAIProvider generating chat completion"
        );

        send_chat_completion(
            &self.client,
            ProviderId::OpenAI,
            &self.config,
            &self.api_key,
            &request.chat_messages(),
        )
        .await
    }

    fn label(&self) -> &str {
        ProviderId::OpenAI.label()
    }
}

// OpenAI API request/response structures

#[derive(Debug, Serialize)]
pub(crate) struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct OpenAIMessage {
    role: String,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAIChoice {
    message: OpenAIMessage,
}

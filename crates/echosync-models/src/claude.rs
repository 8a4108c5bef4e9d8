//! Claude (Anthropic) provider implementation.
//!
//! Claude takes the persona through a dedicated `system` field rather than as
//! a message in the conversation, and requires `max_tokens` on every request.

use crate::factory::ProviderConfig;
use crate::http::{build_client, map_decode_error, map_send_error, map_status_error};
use async_trait::async_trait;
use echosync_abstraction::{
    ChatMessage, CompletionRequest, ProviderCallable, ProviderError, ProviderId, ProviderResponse,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Version header required by the Messages API.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Used when the configuration does not set `max_tokens`.
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Claude provider implementation.
#[derive(Debug, Clone)]
pub struct ClaudeProvider {
    config: ProviderConfig,
    api_key: String,
    client: Client,
}

impl ClaudeProvider {
    /// Creates a new `ClaudeProvider` with a custom configuration and API key.
    ///
    /// # Errors
    /// Returns a `ProviderError` if the HTTP client cannot be built.
    pub fn with_config(config: ProviderConfig, api_key: String) -> Result<Self, ProviderError> {
        let client = build_client(ProviderId::Claude, config.timeout)?;
        Ok(Self { config, api_key, client })
    }

    /// Returns the first system message, which becomes the `system` field.
    fn extract_system_prompt(messages: &[ChatMessage]) -> Option<String> {
        messages.iter().find(|msg| msg.role == "system").map(|msg| msg.content.clone())
    }

    fn to_claude_message(msg: &ChatMessage) -> ClaudeMessage {
        ClaudeMessage {
            role: if msg.role == "assistant" { "assistant" } else { "user" }.to_string(),
            content: msg.content.clone(),
        }
    }
}

#[async_trait]
impl ProviderCallable for ClaudeProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<ProviderResponse, ProviderError> {
        debug!(
            model_id = %self.config.model_id,
            message_len = request.message.len(),
            "ClaudeProvider generating chat completion"
        );

        let url = format!("{}/messages", self.config.base_url);
        let messages = request.chat_messages();

        let request_body = ClaudeRequest {
            model: self.config.model_id.clone(),
            system: Self::extract_system_prompt(&messages),
            messages: messages
                .iter()
                .filter(|msg| msg.role != "system")
                .map(Self::to_claude_message)
                .collect(),
            max_tokens: self.config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| map_send_error(ProviderId::Claude, self.config.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(map_status_error(ProviderId::Claude, status, error_text));
        }

        let claude_response: ClaudeResponse =
            response.json().await.map_err(|e| map_decode_error(ProviderId::Claude, e))?;

        let content = claude_response
            .content
            .into_iter()
            .find(|c| c.content_type == "text")
            .and_then(|c| c.text)
            .ok_or_else(|| {
                error!("No text content in Claude API response");
                ProviderError::ResponseError("No text content in API response".to_string())
            })?;

        Ok(ProviderResponse {
            content,
            model_id: claude_response.model.or_else(|| Some(self.config.model_id.clone())),
        })
    }

    fn label(&self) -> &str {
        ProviderId::Claude.label()
    }
}

// Claude API request/response structures

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    messages: Vec<ClaudeMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    content: Vec<ClaudeContent>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaudeContent {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

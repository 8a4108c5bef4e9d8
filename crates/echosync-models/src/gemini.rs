//! Google Gemini provider implementation.
//!
//! The API key travels as the `key` query parameter and the persona is sent
//! through the dedicated `systemInstruction` field.

use crate::factory::ProviderConfig;
use crate::http::{build_client, map_decode_error, map_send_error, map_status_error};
use async_trait::async_trait;
use echosync_abstraction::{
    ChatMessage, CompletionRequest, ProviderCallable, ProviderError, ProviderId, ProviderResponse,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Gemini provider implementation.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    config: ProviderConfig,
    api_key: String,
    client: Client,
}

impl GeminiProvider {
    /// Creates a new `GeminiProvider` with a custom configuration and API key.
    ///
    /// # Errors
    /// Returns a `ProviderError` if the HTTP client cannot be built.
    pub fn with_config(config: ProviderConfig, api_key: String) -> Result<Self, ProviderError> {
        let client = build_client(ProviderId::Gemini, config.timeout)?;
        Ok(Self { config, api_key, client })
    }

    /// Converts our ChatMessage role to Gemini API role format.
    fn role_to_gemini(role: &str) -> String {
        match role {
            "assistant" => "model".to_string(),
            _ => "user".to_string(),
        }
    }

    /// Joins every system message with a blank line between them.
    fn extract_system_messages(messages: &[ChatMessage]) -> Option<String> {
        let system_messages: Vec<&str> = messages
            .iter()
            .filter(|msg| msg.role == "system")
            .map(|msg| msg.content.as_str())
            .collect();

        if system_messages.is_empty() { None } else { Some(system_messages.join("\n\n")) }
    }
}

#[async_trait]
impl ProviderCallable for GeminiProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<ProviderResponse, ProviderError> {
        debug!(
            model_id = %self.config.model_id,
            message_len = request.message.len(),
            "GeminiProvider generating content"
        );

        let url = format!("{}/models/{}:generateContent", self.config.base_url, self.config.model_id);
        let messages = request.chat_messages();

        let request_body = GeminiRequest {
            contents: messages
                .iter()
                .filter(|msg| msg.role != "system")
                .map(|msg| GeminiContent {
                    role: Some(Self::role_to_gemini(&msg.role)),
                    parts: vec![GeminiPart { text: Some(msg.content.clone()) }],
                })
                .collect(),
            system_instruction: Self::extract_system_messages(&messages).map(|text| {
                GeminiSystemInstruction { parts: vec![GeminiPart { text: Some(text) }] }
            }),
            generation_config: self.config.temperature.map(|temperature| GeminiGenerationConfig {
                temperature: Some(temperature),
                max_output_tokens: self.config.max_tokens,
            }),
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| map_send_error(ProviderId::Gemini, self.config.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(map_status_error(ProviderId::Gemini, status, error_text));
        }

        let gemini_response: GeminiResponse =
            response.json().await.map_err(|e| map_decode_error(ProviderId::Gemini, e))?;

        let content = gemini_response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| {
                error!("No content in Gemini API response");
                ProviderError::ResponseError("No content in API response".to_string())
            })?;

        Ok(ProviderResponse { content, model_id: Some(self.config.model_id.clone()) })
    }

    fn label(&self) -> &str {
        ProviderId::Gemini.label()
    }
}

// Gemini API request/response structures

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "systemInstruction")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "generationConfig")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::time::Duration;

    fn provider_for(server_url: &str) -> GeminiProvider {
        let config = ProviderConfig::new("gemini-1.5-flash", format!("{}/v1beta", server_url), Duration::from_secs(5));
        GeminiProvider::with_config(config, "test-key".to_string()).unwrap()
    }

    #[test]
    fn test_role_conversion() {
        assert_eq!(GeminiProvider::role_to_gemini("user"), "user");
        assert_eq!(GeminiProvider::role_to_gemini("assistant"), "model");
    }

    #[test]
    fn test_system_instruction_omitted_without_persona() {
        let request = GeminiRequest {
            contents: vec![],
            system_instruction: None,
            generation_config: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("systemInstruction"));
        assert!(!json.contains("generationConfig"));
    }

    #[tokio::test]
    async fn test_gemini_extracts_first_candidate() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .match_query(Matcher::Missing)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "systemInstruction": { "parts": [{ "text": "You coordinate." }] }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{
                "candidates": [
                    { "content": { "role": "model", "parts": [{ "text": "Synthesized view" }] } },
                    { "content": { "role": "model", "parts": [{ "text": "ignored" }] } }
                ]
            }"#)
            .create_async()
            .await;

        let provider = provider_for(&server.url());
        let reply = provider
            .complete(&CompletionRequest::new("You coordinate.", "Summarize"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(reply.content, "Synthesized view");
    }

    #[tokio::test]
    async fn test_gemini_blocked_candidate_is_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#)
            .create_async()
            .await;

        let provider = provider_for(&server.url());
        let result = provider.complete(&CompletionRequest::new("", "hi")).await;
        assert!(matches!(result, Err(ProviderError::ResponseError(_))));
    }

    #[tokio::test]
    async fn test_gemini_bad_request() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
            .with_status(400)
            .with_body(r#"{"error": {"message": "API key not valid"}}"#)
            .create_async()
            .await;

        let provider = provider_for(&server.url());
        let err = provider.complete(&CompletionRequest::new("", "hi")).await.unwrap_err();
        assert!(matches!(err, ProviderError::ResponseError(ref msg) if msg.contains("400")));
    }

    #[tokio::test]
    async fn test_gemini_key_not_in_error_text() {
        let config = ProviderConfig::new("gemini-1.5-flash", "http://127.0.0.1:1/v1beta", Duration::from_secs(2));
        let provider = GeminiProvider::with_config(config, "AIzaSECRET-KEY-VALUE-123".to_string()).unwrap();

        let err = provider.complete(&CompletionRequest::new("", "hi")).await.unwrap_err();
        let text = err.to_string();
        assert!(matches!(err, ProviderError::RequestError(_) | ProviderError::Timeout(_)), "unexpected error: {err:?}");
        assert!(!text.contains("AIzaSECRET-KEY-VALUE-123"), "key in error: {text}");
        assert!(!text.contains("generateContent"), "url in error: {text}");
    }
}

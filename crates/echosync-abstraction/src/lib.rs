//! Provider abstraction layer for EchoSync.
//!
//! This module defines the core trait and types every completion provider
//! implements, so the dispatch layer can call OpenAI, Claude, Gemini,
//! Perplexity or the local simulator through one interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Represents an error that can occur when calling a completion provider.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderError {
    /// An error occurred while sending the request (e.g., network issues).
    #[error("Request Error: {0}")]
    RequestError(String),

    /// The provider did not answer within its timeout ceiling.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The provider returned an error status or an unusable body.
    #[error("Provider Response Error: {0}")]
    ResponseError(String),

    /// The response envelope could not be decoded.
    #[error("Serialization Error: {0}")]
    SerializationError(String),

    /// No credential is available for a live call.
    #[error("Missing credential for provider '{0}'")]
    MissingCredential(String),

    /// Provider quota exceeded or rate limit hit.
    #[error("Provider '{provider}' quota exceeded{}", message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default())]
    QuotaExceeded {
        /// The provider name (e.g., "openai", "gemini").
        provider: String,
        /// Optional error message from the provider.
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Other unexpected errors.
    #[error("Other Provider Error: {0}")]
    Other(String),
}

/// The fixed set of providers EchoSync knows how to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Google Gemini.
    Gemini,
    /// OpenAI chat completions.
    #[serde(rename = "openai")]
    OpenAI,
    /// Anthropic Claude.
    Claude,
    /// Perplexity (OpenAI-shaped chat completions).
    Perplexity,
}

impl ProviderId {
    /// Every canonical provider, in status-report order.
    pub const ALL: [Self; 4] = [Self::Gemini, Self::OpenAI, Self::Claude, Self::Perplexity];

    /// The identifier used as the vault key and in serialized output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAI => "openai",
            Self::Claude => "claude",
            Self::Perplexity => "perplexity",
        }
    }

    /// Human-readable vendor label used in reply text.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Gemini => "Gemini",
            Self::OpenAI => "OpenAI",
            Self::Claude => "Claude",
            Self::Perplexity => "Perplexity",
        }
    }

    /// Environment variable that carries this provider's API key.
    #[must_use]
    pub const fn key_env_var(self) -> &'static str {
        match self {
            Self::Gemini => "GEMINI_API_KEY",
            Self::OpenAI => "OPENAI_API_KEY",
            Self::Claude => "CLAUDE_API_KEY",
            Self::Perplexity => "PERPLEXITY_API_KEY",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAI),
            "claude" | "anthropic" => Ok(Self::Claude),
            "perplexity" => Ok(Self::Perplexity),
            other => Err(ProviderError::Other(format!("Unknown provider: {}", other))),
        }
    }
}

/// Represents a message in a conversation with a chat provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message sender ("user", "assistant", "system").
    pub role: String,
    /// The content of the message.
    pub content: String,
}

/// A single completion request: the node's persona plus the user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Persona instruction for the node issuing the call.
    pub persona: String,
    /// The user message being dispatched.
    pub message: String,
}

impl CompletionRequest {
    /// Creates a new request.
    #[must_use]
    pub fn new(persona: impl Into<String>, message: impl Into<String>) -> Self {
        Self { persona: persona.into(), message: message.into() }
    }

    /// Renders the request as a system + user conversation.
    ///
    /// The system message is omitted when the persona is blank.
    #[must_use]
    pub fn chat_messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if !self.persona.trim().is_empty() {
            messages.push(ChatMessage { role: "system".to_string(), content: self.persona.clone() });
        }
        messages.push(ChatMessage { role: "user".to_string(), content: self.message.clone() });
        messages
    }
}

/// The plain-text reply extracted from a provider's response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated text.
    pub content: String,
    /// Optional: the model that produced the text.
    pub model_id: Option<String>,
}

/// A trait for calling one completion provider.
///
/// Implementations must be `Send + Sync` so a node can call them from any
/// tokio worker.
#[async_trait]
pub trait ProviderCallable: Send + Sync {
    /// Sends the request and returns the extracted reply text.
    ///
    /// # Errors
    /// Returns a `ProviderError` if the call fails, times out, or the
    /// response does not contain the expected text field.
    async fn complete(&self, request: &CompletionRequest) -> Result<ProviderResponse, ProviderError>;

    /// Short label used when formatting replies (e.g., "OpenAI").
    fn label(&self) -> &str;

    /// Whether this callable talks to a real remote provider.
    fn is_live(&self) -> bool {
        true
    }
}

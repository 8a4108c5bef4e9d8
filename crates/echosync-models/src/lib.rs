//! Provider implementations for EchoSync.
//!
//! This crate provides concrete implementations of the `ProviderCallable`
//! trait.
//!
//! # Supported Providers
//!
//! - **OpenAI**: chat completions, bearer auth
//! - **Claude**: Anthropic Messages API, `x-api-key` header
//! - **Gemini**: `generateContent`, key as query parameter
//! - **Perplexity**: OpenAI-shaped chat completions, bearer auth
//! - **Simulated**: local canned replies when no credential is available

pub mod claude;
pub mod factory;
pub mod gemini;
mod http;
pub mod openai;
pub mod perplexity;
pub mod simulated;

pub use claude::ClaudeProvider;
pub use factory::{ProviderConfig, ProviderFactory};
pub use gemini::GeminiProvider;
pub use openai::OpenAIProvider;
pub use perplexity::PerplexityProvider;
pub use simulated::{SimulatedProvider, SimulationConfig};

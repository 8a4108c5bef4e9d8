//! Provider factory for creating callables from a resolved call mode.
//!
//! A node resolves its mode once per call (live with a credential, or
//! simulated) and asks the factory for the matching `ProviderCallable`.

use crate::{ClaudeProvider, GeminiProvider, OpenAIProvider, PerplexityProvider, SimulatedProvider};
use crate::simulated::SimulationConfig;
use echosync_abstraction::{ProviderCallable, ProviderError, ProviderId};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Connection settings for one live provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    /// The model ID (e.g., "gpt-3.5-turbo", "claude-3-haiku-20240307").
    pub model_id: String,
    /// Base URL of the provider API, without a trailing slash.
    pub base_url: String,
    /// Hard ceiling for one request, connect through body.
    pub timeout: Duration,
    /// Maximum tokens to generate, where the provider requires it.
    pub max_tokens: Option<u32>,
    /// Sampling temperature, where configured.
    pub temperature: Option<f32>,
}

impl ProviderConfig {
    /// Creates a configuration with the given model, base URL and timeout.
    #[must_use]
    pub fn new(model_id: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            model_id: model_id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Sets the maximum token count.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Built-in defaults for each provider.
    #[must_use]
    pub fn default_for(provider: ProviderId) -> Self {
        match provider {
            ProviderId::OpenAI => {
                Self::new("gpt-3.5-turbo", "https://api.openai.com/v1", Duration::from_secs(20))
            }
            ProviderId::Claude => Self::new(
                "claude-3-haiku-20240307",
                "https://api.anthropic.com/v1",
                Duration::from_secs(25),
            )
            .with_max_tokens(1024)
            .with_temperature(0.7),
            ProviderId::Gemini => Self::new(
                "gemini-1.5-flash",
                "https://generativelanguage.googleapis.com/v1beta",
                Duration::from_secs(20),
            ),
            ProviderId::Perplexity => Self::new(
                "llama-3.1-sonar-small-128k-online",
                "https://api.perplexity.ai",
                Duration::from_secs(25),
            ),
        }
    }
}

/// Factory for creating provider callables.
pub struct ProviderFactory;

impl ProviderFactory {
    /// Creates a live callable for `provider` authenticated with `api_key`.
    ///
    /// # Errors
    /// Returns a `ProviderError` if the API key is blank or the HTTP client
    /// cannot be built.
    pub fn create_live(
        provider: ProviderId,
        config: &ProviderConfig,
        api_key: String,
    ) -> Result<Arc<dyn ProviderCallable>, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::MissingCredential(provider.as_str().to_string()));
        }

        debug!(
            provider = %provider,
            model_id = %config.model_id,
            timeout_secs = config.timeout.as_secs(),
            "Creating live provider"
        );

        let callable: Arc<dyn ProviderCallable> = match provider {
            ProviderId::OpenAI => Arc::new(OpenAIProvider::with_config(config.clone(), api_key)?),
            ProviderId::Claude => Arc::new(ClaudeProvider::with_config(config.clone(), api_key)?),
            ProviderId::Gemini => Arc::new(GeminiProvider::with_config(config.clone(), api_key)?),
            ProviderId::Perplexity => {
                Arc::new(PerplexityProvider::with_config(config.clone(), api_key)?)
            }
        };
        Ok(callable)
    }

    /// Creates the local simulator, tagged with the reason it was chosen.
    #[must_use]
    pub fn create_simulated(reason: impl Into<String>, config: SimulationConfig) -> Arc<dyn ProviderCallable> {
        Arc::new(SimulatedProvider::new(reason, config))
    }
}

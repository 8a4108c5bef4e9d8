//! Configuration for EchoSync.
//!
//! `EchoConfig` is built once at startup and handed by reference to the
//! vault and the dispatch coordinator. Values are layered:
//!
//! 1. Built-in defaults
//! 2. TOML config file (`--config` path or `./echosync.toml`)
//! 3. Environment overrides, including provider API keys

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use echosync_abstraction::ProviderId;
use echosync_models::{ProviderConfig, SimulationConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "echosync.toml";

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    /// Failed to parse configuration file.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Service-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Deployment environment label (e.g., "development", "production").
    pub environment: String,
    /// Maximum number of session records kept in memory.
    pub history_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { environment: "development".to_string(), history_limit: 100 }
    }
}

/// Connection settings for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Model identifier sent to the provider.
    pub model: String,
    /// API base URL.
    pub endpoint: String,
    /// Per-request timeout ceiling in seconds.
    pub timeout_secs: u64,
    /// Maximum tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ProviderSettings {
    /// Built-in settings for `provider`.
    #[must_use]
    pub fn default_for(provider: ProviderId) -> Self {
        let config = ProviderConfig::default_for(provider);
        Self {
            model: config.model_id,
            endpoint: config.base_url,
            timeout_secs: config.timeout.as_secs(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    /// Converts these settings into the adapter-level configuration.
    #[must_use]
    pub fn to_provider_config(&self) -> ProviderConfig {
        let mut config =
            ProviderConfig::new(&self.model, &self.endpoint, Duration::from_secs(self.timeout_secs));
        config.max_tokens = self.max_tokens;
        config.temperature = self.temperature;
        config
    }
}

/// Per-provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai: ProviderSettings,
    pub claude: ProviderSettings,
    pub gemini: ProviderSettings,
    pub perplexity: ProviderSettings,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openai: ProviderSettings::default_for(ProviderId::OpenAI),
            claude: ProviderSettings::default_for(ProviderId::Claude),
            gemini: ProviderSettings::default_for(ProviderId::Gemini),
            perplexity: ProviderSettings::default_for(ProviderId::Perplexity),
        }
    }
}

impl ProvidersConfig {
    /// Settings for one provider.
    #[must_use]
    pub fn get(&self, provider: ProviderId) -> &ProviderSettings {
        match provider {
            ProviderId::OpenAI => &self.openai,
            ProviderId::Claude => &self.claude,
            ProviderId::Gemini => &self.gemini,
            ProviderId::Perplexity => &self.perplexity,
        }
    }

    fn get_mut(&mut self, provider: ProviderId) -> &mut ProviderSettings {
        match provider {
            ProviderId::OpenAI => &mut self.openai,
            ProviderId::Claude => &mut self.claude,
            ProviderId::Gemini => &mut self.gemini,
            ProviderId::Perplexity => &mut self.perplexity,
        }
    }
}

/// Where the vault keeps its files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the credential and key files.
    pub data_dir: PathBuf,
    /// Encrypted credential store file name.
    pub credentials_file: String,
    /// Hex-encoded key file name.
    pub key_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            credentials_file: "encrypted_credentials.json".to_string(),
            key_file: ".encryption_key".to_string(),
        }
    }
}

impl StorageConfig {
    /// Full path of the encrypted credential store.
    #[must_use]
    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir.join(&self.credentials_file)
    }

    /// Full path of the key file.
    #[must_use]
    pub fn key_path(&self) -> PathBuf {
        self.data_dir.join(&self.key_file)
    }
}

/// Simulator latency bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self { min_delay_ms: 100, max_delay_ms: 200 }
    }
}

impl SimulationSettings {
    /// Converts these settings into the simulator configuration.
    #[must_use]
    pub fn to_simulation_config(self) -> SimulationConfig {
        SimulationConfig {
            min_delay: Duration::from_millis(self.min_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// Root configuration for EchoSync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoConfig {
    pub server: ServerConfig,
    pub providers: ProvidersConfig,
    pub storage: StorageConfig,
    pub simulation: SimulationSettings,
    /// Provider id (lower-case) to API key, captured from the environment.
    ///
    /// Never written back to disk.
    #[serde(skip_serializing)]
    pub env_credentials: HashMap<String, String>,
}

impl EchoConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))
    }

    /// Loads the full layered configuration.
    ///
    /// An explicit `path` must exist; otherwise `./echosync.toml` is used if
    /// present. Environment overrides are applied last and the result is
    /// validated.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => {
                let local = Path::new(DEFAULT_CONFIG_FILE);
                if local.exists() {
                    Self::load_from_file(local)?
                } else {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Applies overrides from an arbitrary variable lookup.
    ///
    /// Blank values are ignored. Numeric values that fail to parse keep the
    /// previous setting.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        for (provider, model_var) in [
            (ProviderId::OpenAI, "OPENAI_MODEL"),
            (ProviderId::Claude, "CLAUDE_MODEL"),
            (ProviderId::Gemini, "GEMINI_MODEL"),
            (ProviderId::Perplexity, "PERPLEXITY_MODEL"),
        ] {
            if let Some(model) = var(model_var) {
                self.providers.get_mut(provider).model = model;
            }
        }

        if let Some(raw) = var("CLAUDE_MAX_TOKENS") {
            match raw.parse::<u32>() {
                Ok(value) => self.providers.claude.max_tokens = Some(value),
                Err(_) => warn!(variable = "CLAUDE_MAX_TOKENS", value = %raw, "Ignoring unparseable override"),
            }
        }
        if let Some(raw) = var("CLAUDE_TEMPERATURE") {
            match raw.parse::<f32>() {
                Ok(value) => self.providers.claude.temperature = Some(value),
                Err(_) => warn!(variable = "CLAUDE_TEMPERATURE", value = %raw, "Ignoring unparseable override"),
            }
        }
        if let Some(raw) = var("HISTORY_LIMIT") {
            match raw.parse::<usize>() {
                Ok(value) => self.server.history_limit = value,
                Err(_) => warn!(variable = "HISTORY_LIMIT", value = %raw, "Ignoring unparseable override"),
            }
        }
        if let Some(env) = var("NODE_ENV") {
            self.server.environment = env;
        }
        if let Some(dir) = var("ECHOSYNC_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }

        for provider in ProviderId::ALL {
            if let Some(key) = var(provider.key_env_var()) {
                self.env_credentials.insert(provider.as_str().to_string(), key);
            }
        }
    }

    /// Rejects settings the dispatch layer cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        for provider in ProviderId::ALL {
            if self.providers.get(provider).timeout_secs == 0 {
                return Err(ConfigError::InvalidValue(format!(
                    "providers.{}.timeout_secs must be greater than zero",
                    provider
                )));
            }
        }
        if self.simulation.min_delay_ms > self.simulation.max_delay_ms {
            return Err(ConfigError::InvalidValue(format!(
                "simulation.min_delay_ms ({}) exceeds max_delay_ms ({})",
                self.simulation.min_delay_ms, self.simulation.max_delay_ms
            )));
        }
        if self.server.history_limit == 0 {
            return Err(ConfigError::InvalidValue(
                "server.history_limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Adapter-level configuration for one provider.
    #[must_use]
    pub fn provider_config(&self, provider: ProviderId) -> ProviderConfig {
        self.providers.get(provider).to_provider_config()
    }

    /// Simulator configuration.
    #[must_use]
    pub fn simulation_config(&self) -> SimulationConfig {
        self.simulation.to_simulation_config()
    }
}

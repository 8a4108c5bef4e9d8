//! EchoSync Core - configuration and credential storage.
//!
//! This crate provides:
//! - `EchoConfig`, the layered TOML + environment configuration
//! - `CredentialVault`, the encrypted-at-rest store for provider keys
//!
//! # Example
//!
//! ```rust,no_run
//! use echosync_core::{CredentialVault, EchoConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EchoConfig::load(None)?;
//! let vault = CredentialVault::new(&config);
//! vault.initialize().await;
//! vault.set("openai", "sk-...").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod security;

pub use config::{ConfigError, ConfigResult, EchoConfig};
pub use security::{
    CredentialCipher, CredentialState, CredentialStatus, CredentialVault, SecurityError,
    SecurityResult,
};

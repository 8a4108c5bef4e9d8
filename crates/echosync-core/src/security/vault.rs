//! Encrypted-at-rest credential vault.
//!
//! Holds at most one secret per provider identifier. Environment credentials
//! captured in [`EchoConfig`] take precedence over persisted ones, and every
//! `set` rewrites the full store, encrypting each entry independently.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use echosync_abstraction::ProviderId;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::cipher::CredentialCipher;
use super::error::{SecurityError, SecurityResult};
use crate::config::EchoConfig;

/// Placeholder preview for a provider without a key.
pub const NO_KEY_PREVIEW: &str = "no key";

/// Whether a provider currently has a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialState {
    Active,
    Missing,
}

/// Redacted view of one provider's credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialStatus {
    pub provider: String,
    pub state: CredentialState,
    pub preview: String,
}

#[derive(Debug, Default)]
struct VaultState {
    credentials: HashMap<String, String>,
    cipher: Option<Arc<CredentialCipher>>,
    initialized: bool,
    load_failures: Vec<String>,
}

/// Credential vault shared by every node.
#[derive(Debug)]
pub struct CredentialVault {
    state: RwLock<VaultState>,
    env_credentials: HashMap<String, String>,
    credentials_path: PathBuf,
    key_path: PathBuf,
}

/// Lower-cases and trims a provider identifier.
fn normalize_provider(provider: &str) -> String {
    provider.trim().to_lowercase()
}

/// Secrets this short are masked entirely.
const MIN_PREVIEW_LEN: usize = 9;

/// Placeholder preview for a secret too short to reveal any part of.
const MASKED_PREVIEW: &str = "****";

/// First four and last four characters of `secret`.
fn preview(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() < MIN_PREVIEW_LEN {
        return MASKED_PREVIEW.to_string();
    }
    let head: String = chars.iter().take(4).collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{}...{}", head, tail)
}

impl CredentialVault {
    /// Creates an uninitialized vault using the storage paths and environment
    /// credentials from `config`.
    #[must_use]
    pub fn new(config: &EchoConfig) -> Self {
        let env_credentials = config
            .env_credentials
            .iter()
            .filter(|(_, secret)| !secret.trim().is_empty())
            .map(|(provider, secret)| (normalize_provider(provider), secret.trim().to_string()))
            .collect();

        Self {
            state: RwLock::new(VaultState::default()),
            env_credentials,
            credentials_path: config.storage.credentials_path(),
            key_path: config.storage.key_path(),
        }
    }

    /// Path of the encrypted credential store.
    #[must_use]
    pub fn credentials_path(&self) -> &Path {
        &self.credentials_path
    }

    /// Loads environment credentials, then the persisted store.
    ///
    /// Calling this more than once has no further effect. Unreadable files and
    /// undecryptable entries are logged and skipped.
    pub async fn initialize(&self) {
        let mut state = self.state.write().await;
        if state.initialized {
            return;
        }
        self.load_into(&mut state).await;
    }

    async fn load_into(&self, state: &mut VaultState) {
        let key_path = self.key_path.clone();
        let loaded = tokio::task::spawn_blocking(move || CredentialCipher::load_or_create(&key_path))
            .await
            .map_err(|e| SecurityError::EncryptionError(e.to_string()))
            .and_then(|result| result);
        let cipher = match loaded {
            Ok(cipher) => cipher,
            Err(e) => {
                error!(
                    path = %self.key_path.display(),
                    error = %e,
                    "Failed to persist encryption key, using an in-memory key"
                );
                CredentialCipher::generate()
            }
        };

        state.credentials.clone_from(&self.env_credentials);
        state.load_failures.clear();

        match self.read_store().await {
            Ok(stored) => {
                for (provider, encrypted) in stored {
                    let provider = normalize_provider(&provider);
                    if state.credentials.contains_key(&provider) {
                        debug!(provider = %provider, "Environment credential takes precedence");
                        continue;
                    }
                    match cipher.decrypt(&encrypted) {
                        Some(secret) if !secret.trim().is_empty() => {
                            state.credentials.insert(provider, secret);
                        }
                        _ => {
                            warn!(provider = %provider, "Dropping undecryptable credential");
                            state.load_failures.push(provider);
                        }
                    }
                }
            }
            Err(e) => {
                warn!(path = %self.credentials_path.display(), error = %e, "Ignoring unreadable credential store");
            }
        }

        state.load_failures.sort();
        state.cipher = Some(Arc::new(cipher));
        state.initialized = true;

        info!(
            credentials = state.credentials.len(),
            failures = state.load_failures.len(),
            "Credential vault initialized"
        );
    }

    async fn read_store(&self) -> SecurityResult<HashMap<String, String>> {
        let contents = match fs::read_to_string(&self.credentials_path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&contents).map_err(|e| SecurityError::VaultCorruption(e.to_string()))
    }

    /// Returns the secret for `provider`, if any.
    pub async fn get(&self, provider: &str) -> Option<String> {
        let state = self.state.read().await;
        state.credentials.get(&normalize_provider(provider)).cloned()
    }

    /// True iff a non-empty secret is present for `provider`.
    pub async fn has(&self, provider: &str) -> bool {
        let state = self.state.read().await;
        state
            .credentials
            .get(&normalize_provider(provider))
            .is_some_and(|secret| !secret.is_empty())
    }

    /// Stores `secret` for `provider`, or removes the entry when `secret` is
    /// blank, then rewrites the persisted store.
    ///
    /// The in-memory change stands even if persisting fails.
    ///
    /// # Errors
    ///
    /// Returns an error if `provider` is blank, or if any entry cannot be
    /// encrypted or the store cannot be written.
    pub async fn set(&self, provider: &str, secret: &str) -> SecurityResult<()> {
        let provider = normalize_provider(provider);
        if provider.is_empty() {
            return Err(SecurityError::InvalidProvider(provider));
        }

        let mut state = self.state.write().await;
        if !state.initialized {
            self.load_into(&mut state).await;
        }

        let secret = secret.trim();
        if secret.is_empty() {
            state.credentials.remove(&provider);
            info!(provider = %provider, "Credential removed");
        } else {
            state.credentials.insert(provider.clone(), secret.to_string());
            info!(provider = %provider, preview = %preview(secret), "Credential stored");
        }

        self.persist(&state).await.inspect_err(|e| {
            error!(
                path = %self.credentials_path.display(),
                error = %e,
                "Failed to persist credentials"
            );
        })
    }

    /// Encrypts every credential, then writes the store with 0600 permissions.
    async fn persist(&self, state: &VaultState) -> SecurityResult<()> {
        let cipher = state
            .cipher
            .as_ref()
            .ok_or_else(|| SecurityError::EncryptionError("vault not initialized".to_string()))?;

        let mut encrypted = std::collections::BTreeMap::new();
        for (provider, secret) in &state.credentials {
            let value = cipher.encrypt(secret).ok_or_else(|| {
                SecurityError::EncryptionError(format!("could not encrypt credential for {}", provider))
            })?;
            encrypted.insert(provider.as_str(), value);
        }

        if let Some(dir) = self.credentials_path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).await?;
            }
        }

        let json = serde_json::to_string_pretty(&encrypted)?;
        fs::write(&self.credentials_path, json).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.credentials_path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        debug!(entries = encrypted.len(), "Credential store written");
        Ok(())
    }

    /// Redacted status for the four recognized providers, followed by any
    /// other stored identifiers in sorted order.
    pub async fn status(&self) -> Vec<CredentialStatus> {
        let state = self.state.read().await;

        let mut providers: Vec<String> =
            ProviderId::ALL.iter().map(|p| p.as_str().to_string()).collect();
        let mut extra: Vec<String> = state
            .credentials
            .keys()
            .filter(|key| !ProviderId::ALL.iter().any(|p| p.as_str() == key.as_str()))
            .cloned()
            .collect();
        extra.sort();
        providers.extend(extra);

        providers
            .into_iter()
            .map(|provider| match state.credentials.get(&provider).filter(|s| !s.is_empty()) {
                Some(secret) => CredentialStatus {
                    preview: preview(secret),
                    provider,
                    state: CredentialState::Active,
                },
                None => CredentialStatus {
                    provider,
                    state: CredentialState::Missing,
                    preview: NO_KEY_PREVIEW.to_string(),
                },
            })
            .collect()
    }

    /// Number of recognized providers with a key.
    pub async fn active_count(&self) -> usize {
        let state = self.state.read().await;
        ProviderId::ALL
            .iter()
            .filter(|p| state.credentials.get(p.as_str()).is_some_and(|s| !s.is_empty()))
            .count()
    }

    /// Providers whose persisted entry could not be decrypted at load time.
    pub async fn load_failures(&self) -> Vec<String> {
        self.state.read().await.load_failures.clone()
    }
}

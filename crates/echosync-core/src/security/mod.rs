//! Security module for credential storage.
//!
//! This module provides:
//! - AES-256-GCM encryption of individual credentials
//! - The encrypted-at-rest `CredentialVault`

mod cipher;
mod error;
mod vault;

pub use cipher::CredentialCipher;
pub use error::{SecurityError, SecurityResult};
pub use vault::{CredentialState, CredentialStatus, CredentialVault, NO_KEY_PREVIEW};

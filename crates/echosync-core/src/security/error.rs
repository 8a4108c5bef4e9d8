//! Error types for security operations.

use thiserror::Error;

/// Security-related errors.
#[derive(Error, Debug)]
pub enum SecurityError {
    /// Provider identifier was blank.
    #[error("Invalid provider identifier: {0:?}")]
    InvalidProvider(String),

    /// Encryption/decryption error.
    #[error("Encryption error: {0}")]
    EncryptionError(String),

    /// The persisted key file did not hold a usable 256-bit key.
    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    /// I/O error occurred during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Credential store exists but is not a JSON object of strings.
    #[error("Vault corruption: {0}")]
    VaultCorruption(String),
}

/// Result type alias for security operations.
pub type SecurityResult<T> = std::result::Result<T, SecurityError>;

//! Error types for dispatch

use thiserror::Error;

/// Result type for dispatch operations
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Dispatch errors
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Message was empty or whitespace-only
    #[error("Message is required")]
    EmptyMessage,

    /// The fan-out was cancelled before every node settled
    #[error("Dispatch interrupted: {0}")]
    Interrupted(String),

    /// Credential change failed
    #[error("Credential error: {0}")]
    Credential(#[from] echosync_core::SecurityError),
}

//! Command implementations for the `echosync` binary.

pub mod credentials;
pub mod dispatch;
pub mod status;

use clap::Subcommand;

/// Credential subcommands.
#[derive(Subcommand, Debug)]
pub enum CredentialsCommand {
    /// Store a provider key (an empty key removes it)
    Set {
        /// Provider id (openai, claude, gemini, perplexity)
        provider: String,

        /// API key
        key: String,
    },

    /// Remove a provider key
    Unset {
        /// Provider id
        provider: String,
    },

    /// Show redacted credential status
    Status,
}

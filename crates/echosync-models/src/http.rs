//! Shared HTTP plumbing for the live provider adapters.

use echosync_abstraction::{ProviderError, ProviderId};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::error;

/// Builds an HTTP client whose every request fails after `timeout`.
pub(crate) fn build_client(provider: ProviderId, timeout: Duration) -> Result<Client, ProviderError> {
    Client::builder().timeout(timeout).build().map_err(|e| {
        error!(provider = %provider, error = %e, "Failed to build HTTP client");
        ProviderError::Other(format!("Failed to build HTTP client: {}", e))
    })
}

/// Maps a transport-level failure, keeping timeouts distinguishable.
///
/// The request URL is stripped first; it can carry credentials.
pub(crate) fn map_send_error(provider: ProviderId, timeout: Duration, e: reqwest::Error) -> ProviderError {
    let e = e.without_url();
    if e.is_timeout() {
        error!(provider = %provider, timeout_secs = timeout.as_secs(), "Provider request timed out");
        ProviderError::Timeout(format!(
            "{} did not respond within {}s",
            provider.label(),
            timeout.as_secs()
        ))
    } else {
        error!(provider = %provider, error = %e, "Failed to send request to provider");
        ProviderError::RequestError(format!("Network error: {}", e))
    }
}

/// Maps a non-success HTTP status and body to a provider error.
pub(crate) fn map_status_error(provider: ProviderId, status: StatusCode, body: String) -> ProviderError {
    error!(
        provider = %provider,
        status = %status,
        error = %body,
        "Provider API returned error status"
    );

    match status.as_u16() {
        402 | 429 => ProviderError::QuotaExceeded {
            provider: provider.as_str().to_string(),
            message: Some(body),
        },
        401 | 403 => ProviderError::ResponseError(format!(
            "Authentication failed ({}): {}",
            status, body
        )),
        _ => ProviderError::ResponseError(format!("API error ({}): {}", status, body)),
    }
}

/// Wraps an envelope decode failure.
pub(crate) fn map_decode_error(provider: ProviderId, e: reqwest::Error) -> ProviderError {
    let e = e.without_url();
    error!(provider = %provider, error = %e, "Failed to parse provider response");
    ProviderError::SerializationError(format!("Failed to parse response: {}", e))
}

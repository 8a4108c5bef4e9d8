//! Local simulator used when a node has no credential for its provider.
//!
//! Replies are drawn from a small set of canned templates after a short
//! randomized delay, so a dispatch without any keys still behaves like a
//! real fan-out.

use async_trait::async_trait;
use echosync_abstraction::{CompletionRequest, ProviderCallable, ProviderError, ProviderResponse};
use rand::Rng;
use std::time::Duration;
use tracing::debug;

/// Delay bounds for simulated replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Shortest simulated latency.
    pub min_delay: Duration,
    /// Longest simulated latency.
    pub max_delay: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { min_delay: Duration::from_millis(100), max_delay: Duration::from_millis(200) }
    }
}

impl SimulationConfig {
    /// Picks a delay uniformly inside the configured bounds.
    fn sample_delay(&self) -> Duration {
        if self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        let min = self.min_delay.as_millis() as u64;
        let max = self.max_delay.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

/// Number of canned reply templates.
pub const TEMPLATE_COUNT: usize = 4;

/// Returns the first `max_chars` characters of `message`.
fn excerpt(message: &str, max_chars: usize) -> String {
    message.chars().take(max_chars).collect()
}

/// Renders template `index` (modulo [`TEMPLATE_COUNT`]) for `message`.
#[must_use]
pub fn render_template(index: usize, message: &str) -> String {
    match index % TEMPLATE_COUNT {
        0 => format!("I hear you! You said: \"{}...\"", excerpt(message, 30)),
        1 => "Interesting question! Let me think about that for a moment.".to_string(),
        2 => format!("Here's my take on \"{}...\"", excerpt(message, 25)),
        _ => "Great point! I'm on board with that.".to_string(),
    }
}

/// Provider that fabricates a reply locally.
#[derive(Debug, Clone)]
pub struct SimulatedProvider {
    /// Why the node fell back to simulation (e.g., "no key").
    reason: String,
    label: String,
    config: SimulationConfig,
}

impl SimulatedProvider {
    /// Creates a simulator tagged with `reason`.
    #[must_use]
    pub fn new(reason: impl Into<String>, config: SimulationConfig) -> Self {
        let reason = reason.into();
        let label = format!("simulated - {}", reason);
        Self { reason, label, config }
    }

    /// The reason this simulator was chosen.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[async_trait]
impl ProviderCallable for SimulatedProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<ProviderResponse, ProviderError> {
        // ThreadRng is !Send; draw everything before the first await.
        let (delay, index) = {
            let index = rand::thread_rng().gen_range(0..TEMPLATE_COUNT);
            (self.config.sample_delay(), index)
        };

        debug!(
            reason = %self.reason,
            delay_ms = delay.as_millis() as u64,
            template = index,
            "Simulating provider reply"
        );

        tokio::time::sleep(delay).await;

        Ok(ProviderResponse { content: render_template(index, &request.message), model_id: None })
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn is_live(&self) -> bool {
        false
    }
}

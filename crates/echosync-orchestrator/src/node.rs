//! Provider nodes.
//!
//! A node is a persona bound to one provider. Every `send` resolves the call
//! mode from the vault at that moment: live when a key is present, simulated
//! otherwise. `send` never fails; provider errors come back as reply data.

use chrono::{DateTime, Utc};
use echosync_abstraction::{CompletionRequest, ProviderId};
use echosync_core::{CredentialVault, EchoConfig};
use echosync_models::{ProviderConfig, ProviderFactory, SimulationConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::RequestContext;

/// How a call was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallMode {
    Live,
    Simulated,
}

impl fmt::Display for CallMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Simulated => write!(f, "simulated"),
        }
    }
}

/// Static description of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTemplate {
    pub key: &'static str,
    pub name: &'static str,
    pub provider: ProviderId,
    pub persona: &'static str,
}

/// The four built-in nodes.
pub const NODE_TEMPLATES: [NodeTemplate; 4] = [
    NodeTemplate {
        key: "gpt",
        name: "GPT-Rami",
        provider: ProviderId::OpenAI,
        persona: "You are GPT-Rami, a creative thinker who brings original ideas and inventive solutions.",
    },
    NodeTemplate {
        key: "claude",
        name: "Claude-Business",
        provider: ProviderId::Claude,
        persona: "You are Claude-Business, a strategic business advisor who weighs risks, costs and opportunities.",
    },
    NodeTemplate {
        key: "gemini",
        name: "Gemini-Coordinator",
        provider: ProviderId::Gemini,
        persona: "You are Gemini-Coordinator, who coordinates the discussion and synthesizes the different perspectives.",
    },
    NodeTemplate {
        key: "perplexity",
        name: "Perplexity-Researcher",
        provider: ProviderId::Perplexity,
        persona: "You are Perplexity-Researcher, who researches the topic and brings up-to-date facts and sources.",
    },
];

/// Per-node call counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    /// Sum of elapsed time over successful calls.
    pub total_response_ms: u64,
    /// `total_response_ms / successful_calls`.
    pub avg_response_ms: f64,
    pub last_used: Option<DateTime<Utc>>,
}

impl NodeMetrics {
    fn record_success(&mut self, elapsed_ms: u64) {
        self.successful_calls += 1;
        self.total_response_ms += elapsed_ms;
        self.avg_response_ms = self.total_response_ms as f64 / self.successful_calls as f64;
    }
}

/// Reply from one node for one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReply {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub mode: CallMode,
    pub provider: ProviderId,
    pub elapsed_ms: u64,
    pub success: bool,
}

/// Point-in-time view of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub key: String,
    pub name: String,
    pub provider: ProviderId,
    pub mode: CallMode,
    pub metrics: NodeMetrics,
}

/// A persona bound to one provider.
#[derive(Debug)]
pub struct ProviderNode {
    key: String,
    name: String,
    provider: ProviderId,
    persona: String,
    provider_config: ProviderConfig,
    simulation: SimulationConfig,
    metrics: Mutex<NodeMetrics>,
}

impl ProviderNode {
    /// Builds a node from `template` using the provider settings in `config`.
    #[must_use]
    pub fn from_template(template: &NodeTemplate, config: &EchoConfig) -> Self {
        info!(node = template.key, provider = %template.provider, "Node initialized");
        Self {
            key: template.key.to_string(),
            name: template.name.to_string(),
            provider: template.provider,
            persona: template.persona.to_string(),
            provider_config: config.provider_config(template.provider),
            simulation: config.simulation_config(),
            metrics: Mutex::new(NodeMetrics::default()),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    #[must_use]
    pub fn persona(&self) -> &str {
        &self.persona
    }

    /// Mode the next call would use.
    pub async fn mode(&self, vault: &CredentialVault) -> CallMode {
        if vault.has(self.provider.as_str()).await { CallMode::Live } else { CallMode::Simulated }
    }

    /// Sends `message` and records the outcome in this node's metrics.
    pub async fn send(
        &self,
        message: &str,
        context: &RequestContext,
        vault: &CredentialVault,
    ) -> NodeReply {
        let start = Instant::now();
        {
            let mut metrics = self.metrics.lock().await;
            metrics.total_calls += 1;
            metrics.last_used = Some(Utc::now());
        }

        let secret = vault.get(self.provider.as_str()).await.filter(|s| !s.trim().is_empty());
        let mode = if secret.is_some() { CallMode::Live } else { CallMode::Simulated };
        debug!(
            node = %self.key,
            provider = %self.provider,
            mode = %mode,
            context_keys = context.len(),
            "Node sending message"
        );

        let callable = match secret {
            Some(api_key) => ProviderFactory::create_live(self.provider, &self.provider_config, api_key),
            None => Ok(ProviderFactory::create_simulated("no key", self.simulation)),
        };

        let request = CompletionRequest::new(&self.persona, message);
        let result = match callable {
            Ok(callable) => {
                let label = callable.label().to_string();
                callable.complete(&request).await.map(|reply| (label, reply))
            }
            Err(e) => Err(e),
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let mut metrics = self.metrics.lock().await;

        match result {
            Ok((label, reply)) => {
                metrics.record_success(elapsed_ms);
                debug!(node = %self.key, elapsed_ms, "Node call succeeded");
                NodeReply {
                    message: format!("{} ({}): {}", self.name, label, reply.content),
                    timestamp: Utc::now(),
                    mode,
                    provider: self.provider,
                    elapsed_ms,
                    success: true,
                }
            }
            Err(e) => {
                metrics.failed_calls += 1;
                error!(node = %self.key, provider = %self.provider, error = %e, "Node call failed");
                NodeReply {
                    message: format!("{}: error - {}", self.name, e),
                    timestamp: Utc::now(),
                    mode,
                    provider: self.provider,
                    elapsed_ms,
                    success: false,
                }
            }
        }
    }

    /// Copy of the current metrics.
    pub async fn metrics(&self) -> NodeMetrics {
        self.metrics.lock().await.clone()
    }

    /// Snapshot including the mode the next call would use.
    pub async fn status(&self, vault: &CredentialVault) -> NodeStatus {
        NodeStatus {
            key: self.key.clone(),
            name: self.name.clone(),
            provider: self.provider,
            mode: self.mode(vault).await,
            metrics: self.metrics().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(dir: &std::path::Path) -> EchoConfig {
        let mut config = EchoConfig::default();
        config.storage.data_dir = dir.to_path_buf();
        config.simulation.min_delay_ms = 1;
        config.simulation.max_delay_ms = 5;
        config
    }

    #[test]
    fn test_metrics_average_over_successes() {
        let mut metrics = NodeMetrics::default();
        metrics.record_success(100);
        metrics.record_success(300);
        metrics.failed_calls += 1;
        assert_eq!(metrics.successful_calls, 2);
        assert!((metrics.avg_response_ms - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_templates_have_unique_keys() {
        let mut keys: Vec<_> = NODE_TEMPLATES.iter().map(|t| t.key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), 4);
    }

    #[tokio::test]
    async fn test_send_without_key_is_simulated_success() {
        let temp = TempDir::new().unwrap();
        let config = test_config(temp.path());
        let vault = CredentialVault::new(&config);
        vault.initialize().await;

        let node = ProviderNode::from_template(&NODE_TEMPLATES[0], &config);
        let reply = node.send("hello", &RequestContext::new(), &vault).await;

        assert!(reply.success);
        assert_eq!(reply.mode, CallMode::Simulated);
        assert!(reply.message.starts_with("GPT-Rami (simulated - no key): "));

        let metrics = node.metrics().await;
        assert_eq!(metrics.total_calls, 1);
        assert_eq!(metrics.successful_calls, 1);
        assert_eq!(metrics.failed_calls, 0);
        assert!(metrics.last_used.is_some());
    }

    #[tokio::test]
    async fn test_live_failure_is_reply_data() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/messages")
            .with_status(500)
            .with_body("internal")
            .create_async()
            .await;

        let temp = TempDir::new().unwrap();
        let mut config = test_config(temp.path());
        config.providers.claude.endpoint = server.url();
        let vault = CredentialVault::new(&config);
        vault.set("claude", "sk-ant-test-0001").await.unwrap();

        let node = ProviderNode::from_template(&NODE_TEMPLATES[1], &config);
        assert_eq!(node.mode(&vault).await, CallMode::Live);

        let reply = node.send("plan", &RequestContext::new(), &vault).await;
        assert!(!reply.success);
        assert_eq!(reply.mode, CallMode::Live);
        assert!(reply.message.starts_with("Claude-Business: error - "));

        let metrics = node.metrics().await;
        assert_eq!(metrics.failed_calls, 1);
        assert_eq!(metrics.successful_calls, 0);
        assert!(metrics.avg_response_ms.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_silent_provider_times_out_as_failed_reply() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let temp = TempDir::new().unwrap();
        let mut config = test_config(temp.path());
        config.providers.claude.endpoint = format!("http://{}", addr);
        config.providers.claude.timeout_secs = 1;
        let vault = CredentialVault::new(&config);
        vault.set("claude", "sk-ant-test-0001").await.unwrap();

        let node = ProviderNode::from_template(&NODE_TEMPLATES[1], &config);
        let reply = node.send("plan", &RequestContext::new(), &vault).await;

        assert!(!reply.success);
        assert_eq!(reply.mode, CallMode::Live);
        assert!(reply.message.contains("did not respond within 1s"), "{}", reply.message);
        assert!(reply.elapsed_ms < 5000);
        assert_eq!(node.metrics().await.failed_calls, 1);
    }

    #[tokio::test]
    async fn test_live_success_uses_provider_label() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices": [{"message": {"role": "assistant", "content": "Fresh idea"}}]}"#)
            .create_async()
            .await;

        let temp = TempDir::new().unwrap();
        let mut config = test_config(temp.path());
        config.providers.openai.endpoint = server.url();
        let vault = CredentialVault::new(&config);
        vault.set("openai", "sk-test-0001").await.unwrap();

        let node = ProviderNode::from_template(&NODE_TEMPLATES[0], &config);
        let reply = node.send("idea please", &RequestContext::new(), &vault).await;
        assert!(reply.success);
        assert_eq!(reply.message, "GPT-Rami (OpenAI): Fresh idea");
    }

    #[tokio::test]
    async fn test_mode_follows_vault_changes() {
        let temp = TempDir::new().unwrap();
        let config = test_config(temp.path());
        let vault = CredentialVault::new(&config);
        let node = ProviderNode::from_template(&NODE_TEMPLATES[2], &config);

        assert_eq!(node.mode(&vault).await, CallMode::Simulated);
        vault.set("gemini", "AIza-test-0001").await.unwrap();
        assert_eq!(node.status(&vault).await.mode, CallMode::Live);
        vault.set("gemini", "").await.unwrap();
        assert_eq!(node.mode(&vault).await, CallMode::Simulated);
    }
}

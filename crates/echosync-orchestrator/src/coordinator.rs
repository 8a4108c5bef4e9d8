//! Concurrent dispatch across provider nodes.
//!
//! The coordinator owns the nodes, resolves which of them a request targets,
//! runs every selected node on its own tokio task and waits for all of them
//! to settle before assembling the keyed result map.

use chrono::{DateTime, Utc};
use echosync_core::{CredentialVault, EchoConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::classifier::{TaskAnalysis, TaskClassifier};
use crate::error::{DispatchError, Result};
use crate::history::{SessionHistory, SessionRecord};
use crate::node::{NodeReply, NodeStatus, ProviderNode, NODE_TEMPLATES};
use crate::status::{CoordinatorMetrics, HealthReport, SystemStatus, VERSION};
use crate::RequestContext;

/// Capacity of the status broadcast channel.
const STATUS_CHANNEL_CAPACITY: usize = 100;

/// Which nodes a dispatch targets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NodeSelector {
    /// Use the classifier's suggestions.
    #[default]
    Auto,
    /// Every configured node.
    All,
    /// Explicit list; unknown keys dropped, duplicates removed, order kept.
    Many(Vec<String>),
    /// One key; falls back to every node if the key is unknown.
    One(String),
}

impl NodeSelector {
    /// Interprets the `nodes` field of a JSON dispatch request.
    ///
    /// Absent or null selects [`NodeSelector::Auto`]. Any shape other than a
    /// string or an array selects every node.
    #[must_use]
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Auto,
            Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("all") => Self::All,
            Some(Value::String(s)) => Self::One(s.clone()),
            Some(Value::Array(items)) => Self::Many(
                items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
            ),
            Some(_) => Self::All,
        }
    }
}

impl FromStr for NodeSelector {
    type Err = Infallible;

    /// `""` → auto, `"all"` → all, `"a,b"` → list, `"a"` → single key.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        Ok(if s.is_empty() {
            Self::Auto
        } else if s.eq_ignore_ascii_case("all") {
            Self::All
        } else if s.contains(',') {
            Self::Many(s.split(',').map(str::to_string).collect())
        } else {
            Self::One(s.to_string())
        })
    }
}

/// Result for one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeOutcome {
    /// The node settled; `reply.success` tells whether the provider call worked.
    Completed(NodeReply),
    /// The node's task died before producing a reply.
    Failed { error: String, timestamp: DateTime<Utc> },
}

impl NodeOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(reply) if reply.success)
    }

    #[must_use]
    pub fn reply(&self) -> Option<&NodeReply> {
        match self {
            Self::Completed(reply) => Some(reply),
            Self::Failed { .. } => None,
        }
    }
}

/// Aggregated result of one dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub message: String,
    pub task_analysis: TaskAnalysis,
    /// Exactly one entry per selected node key.
    pub responses: BTreeMap<String, NodeOutcome>,
    pub timestamp: DateTime<Utc>,
}

/// Owns the nodes and fans messages out to them.
pub struct DispatchCoordinator {
    vault: Arc<CredentialVault>,
    classifier: TaskClassifier,
    nodes: Vec<Arc<ProviderNode>>,
    metrics: Mutex<CoordinatorMetrics>,
    history: Mutex<SessionHistory>,
    status_tx: broadcast::Sender<SystemStatus>,
    started_at: Instant,
}

impl DispatchCoordinator {
    /// Creates a coordinator with the built-in nodes.
    #[must_use]
    pub fn new(config: &EchoConfig, vault: Arc<CredentialVault>) -> Self {
        let nodes = NODE_TEMPLATES
            .iter()
            .map(|template| Arc::new(ProviderNode::from_template(template, config)))
            .collect();
        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);

        Self {
            vault,
            classifier: TaskClassifier::new(),
            nodes,
            metrics: Mutex::new(CoordinatorMetrics::default()),
            history: Mutex::new(SessionHistory::new(config.server.history_limit)),
            status_tx,
            started_at: Instant::now(),
        }
    }

    /// Loads the vault. Safe to call more than once.
    pub async fn initialize(&self) {
        self.vault.initialize().await;
        info!(nodes = self.nodes.len(), "Dispatch coordinator ready");
    }

    #[must_use]
    pub fn vault(&self) -> &Arc<CredentialVault> {
        &self.vault
    }

    #[must_use]
    pub fn classifier(&self) -> &TaskClassifier {
        &self.classifier
    }

    /// Configured node keys in registration order.
    #[must_use]
    pub fn node_keys(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.key().to_string()).collect()
    }

    #[must_use]
    pub fn node(&self, key: &str) -> Option<&Arc<ProviderNode>> {
        let key = key.trim().to_lowercase();
        self.nodes.iter().find(|n| n.key() == key)
    }

    /// Resolves `selector` to configured node keys, without duplicates.
    #[must_use]
    pub fn resolve(&self, selector: &NodeSelector, analysis: &TaskAnalysis) -> Vec<String> {
        let pick = |keys: &[String]| {
            let mut selected: Vec<String> = Vec::with_capacity(keys.len());
            for key in keys {
                if let Some(node) = self.node(key) {
                    if !selected.iter().any(|k| k == node.key()) {
                        selected.push(node.key().to_string());
                    }
                }
            }
            selected
        };

        match selector {
            NodeSelector::Auto => pick(&analysis.suggested_nodes),
            NodeSelector::All => self.node_keys(),
            NodeSelector::Many(keys) => pick(keys),
            NodeSelector::One(key) => match self.node(key) {
                Some(node) => vec![node.key().to_string()],
                None => {
                    debug!(key = %key, "Unknown node key, dispatching to all");
                    self.node_keys()
                }
            },
        }
    }

    /// Sends `message` to every selected node concurrently.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::EmptyMessage`] for a blank message, before any
    /// node is called, and [`DispatchError::Interrupted`] if a node task is
    /// cancelled by the runtime.
    pub async fn dispatch_all(
        &self,
        message: &str,
        selector: &NodeSelector,
        context: RequestContext,
    ) -> Result<DispatchOutcome> {
        if message.trim().is_empty() {
            warn!("Rejected dispatch with empty message");
            return Err(DispatchError::EmptyMessage);
        }

        let start = Instant::now();
        let analysis = self.classifier.analyze(message, &context);
        let keys = self.resolve(selector, &analysis);

        info!(
            nodes = ?keys,
            primary_type = %analysis.primary_type,
            "Dispatching message"
        );

        let mut node_context = context;
        if let Ok(value) = serde_json::to_value(&analysis) {
            node_context.insert("task_analysis".to_string(), value);
        }
        node_context.insert("requester".to_string(), Value::from("dispatch_all"));
        let node_context = Arc::new(node_context);
        let shared_message: Arc<str> = Arc::from(message);

        let mut handles = Vec::with_capacity(keys.len());
        for key in &keys {
            let Some(node) = self.node(key).cloned() else {
                continue;
            };
            let vault = Arc::clone(&self.vault);
            let message = Arc::clone(&shared_message);
            let context = Arc::clone(&node_context);
            let handle =
                tokio::spawn(async move { node.send(&message, &context, &vault).await });
            handles.push((key.clone(), handle));
        }

        let mut responses = BTreeMap::new();
        for (key, handle) in handles {
            match handle.await {
                Ok(reply) => {
                    responses.insert(key, NodeOutcome::Completed(reply));
                }
                Err(e) if e.is_panic() => {
                    error!(node = %key, error = %e, "Node task panicked");
                    responses.insert(
                        key,
                        NodeOutcome::Failed { error: format!("node task panicked: {}", e), timestamp: Utc::now() },
                    );
                }
                Err(e) => {
                    error!(node = %key, error = %e, "Node task cancelled");
                    self.metrics.lock().await.record_failure();
                    return Err(DispatchError::Interrupted(e.to_string()));
                }
            }
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        self.metrics.lock().await.record_success(elapsed_ms);
        self.history
            .lock()
            .await
            .push(SessionRecord::new(message, analysis.primary_type, keys));

        let succeeded = responses.values().filter(|o| o.is_success()).count();
        info!(
            nodes = responses.len(),
            succeeded,
            elapsed_ms,
            "Dispatch complete"
        );

        Ok(DispatchOutcome {
            message: message.to_string(),
            task_analysis: analysis,
            responses,
            timestamp: Utc::now(),
        })
    }

    /// Stores or removes a credential, then publishes a fresh status.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault rejects the change or cannot persist it.
    pub async fn set_credential(&self, provider: &str, secret: &str) -> Result<SystemStatus> {
        self.vault.set(provider, secret).await?;

        let status = self.system_status().await;
        if self.status_tx.send(status.clone()).is_err() {
            debug!("No status subscribers");
        }
        Ok(status)
    }

    /// Receives a `SystemStatus` after every successful credential change.
    #[must_use]
    pub fn subscribe_status(&self) -> broadcast::Receiver<SystemStatus> {
        self.status_tx.subscribe()
    }

    pub async fn node_statuses(&self) -> Vec<NodeStatus> {
        let mut statuses = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            statuses.push(node.status(&self.vault).await);
        }
        statuses
    }

    pub async fn metrics(&self) -> CoordinatorMetrics {
        self.metrics.lock().await.clone()
    }

    /// Session records, oldest first.
    pub async fn history(&self) -> Vec<SessionRecord> {
        self.history.lock().await.records()
    }

    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub async fn system_status(&self) -> SystemStatus {
        SystemStatus {
            state: "active".to_string(),
            version: VERSION.to_string(),
            uptime_secs: self.uptime_secs(),
            nodes: self.node_statuses().await,
            apis: self.vault.status().await,
        }
    }

    pub async fn health(&self) -> HealthReport {
        HealthReport {
            status: "healthy".to_string(),
            version: VERSION.to_string(),
            uptime_secs: self.uptime_secs(),
            metrics: self.metrics().await,
            nodes: self.nodes.len(),
            active_credentials: self.vault.active_count().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn coordinator(dir: &std::path::Path) -> DispatchCoordinator {
        let mut config = EchoConfig::default();
        config.storage.data_dir = dir.to_path_buf();
        let vault = Arc::new(CredentialVault::new(&config));
        DispatchCoordinator::new(&config, vault)
    }

    #[test]
    fn test_selector_from_value() {
        assert_eq!(NodeSelector::from_value(None), NodeSelector::Auto);
        assert_eq!(NodeSelector::from_value(Some(&json!("all"))), NodeSelector::All);
        assert_eq!(NodeSelector::from_value(Some(&json!("gpt"))), NodeSelector::One("gpt".to_string()));
        assert_eq!(
            NodeSelector::from_value(Some(&json!(["gpt", 3, "claude"]))),
            NodeSelector::Many(vec!["gpt".to_string(), "claude".to_string()])
        );
        assert_eq!(NodeSelector::from_value(Some(&json!(42))), NodeSelector::All);
    }

    #[test]
    fn test_selector_from_str() {
        assert_eq!("".parse::<NodeSelector>().unwrap(), NodeSelector::Auto);
        assert_eq!("ALL".parse::<NodeSelector>().unwrap(), NodeSelector::All);
        assert_eq!(
            "gpt,claude".parse::<NodeSelector>().unwrap(),
            NodeSelector::Many(vec!["gpt".to_string(), "claude".to_string()])
        );
        assert_eq!("gemini".parse::<NodeSelector>().unwrap(), NodeSelector::One("gemini".to_string()));
    }

    #[test]
    fn test_resolve_rules() {
        let temp = TempDir::new().unwrap();
        let coordinator = coordinator(temp.path());
        let analysis = TaskAnalysis::default();

        assert_eq!(coordinator.resolve(&NodeSelector::All, &analysis).len(), 4);
        assert_eq!(coordinator.resolve(&NodeSelector::Auto, &analysis), vec!["gpt", "gemini"]);
        assert_eq!(
            coordinator.resolve(
                &NodeSelector::Many(vec![
                    "claude".to_string(),
                    "unknown".to_string(),
                    " GPT ".to_string(),
                    "claude".to_string(),
                ]),
                &analysis
            ),
            vec!["claude", "gpt"]
        );
        assert_eq!(coordinator.resolve(&NodeSelector::One("perplexity".to_string()), &analysis), vec!["perplexity"]);
        assert_eq!(coordinator.resolve(&NodeSelector::One("nope".to_string()), &analysis).len(), 4);
        assert!(coordinator.resolve(&NodeSelector::Many(vec!["nope".to_string()]), &analysis).is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let temp = TempDir::new().unwrap();
        let coordinator = coordinator(temp.path());
        let result = coordinator.dispatch_all("   ", &NodeSelector::All, RequestContext::new()).await;
        assert!(matches!(result, Err(DispatchError::EmptyMessage)));
        assert_eq!(coordinator.metrics().await, CoordinatorMetrics::default());
    }
}

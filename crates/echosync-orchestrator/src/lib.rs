//! Dispatch orchestrator for EchoSync.
//!
//! This crate classifies incoming messages, owns the provider nodes and fans
//! each message out to the selected nodes concurrently.

pub mod classifier;
pub mod coordinator;
pub mod error;
pub mod history;
pub mod node;
pub mod status;

pub use classifier::{InfluenceRecord, TaskAnalysis, TaskClassifier, TaskType};
pub use coordinator::{DispatchCoordinator, DispatchOutcome, NodeOutcome, NodeSelector};
pub use error::{DispatchError, Result};
pub use history::{SessionHistory, SessionRecord};
pub use node::{CallMode, NodeMetrics, NodeReply, NodeStatus, NodeTemplate, ProviderNode, NODE_TEMPLATES};
pub use status::{CoordinatorMetrics, HealthReport, SystemStatus, VERSION};

/// Free-form request context passed through to every node.
pub type RequestContext = serde_json::Map<String, serde_json::Value>;

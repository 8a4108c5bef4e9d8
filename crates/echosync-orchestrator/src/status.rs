//! Coordinator metrics and status snapshots.

use echosync_core::CredentialStatus;
use serde::{Deserialize, Serialize};

use crate::node::NodeStatus;

/// Reported service version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Request counters, updated once per dispatch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Wall time summed over successful dispatches.
    pub total_dispatch_ms: u64,
    pub avg_dispatch_ms: f64,
}

impl CoordinatorMetrics {
    pub(crate) fn record_success(&mut self, elapsed_ms: u64) {
        self.total_requests += 1;
        self.successful_requests += 1;
        self.total_dispatch_ms += elapsed_ms;
        self.avg_dispatch_ms = self.total_dispatch_ms as f64 / self.successful_requests as f64;
    }

    pub(crate) fn record_failure(&mut self) {
        self.total_requests += 1;
        self.failed_requests += 1;
    }
}

/// Full system snapshot, also published after credential changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub state: String,
    pub version: String,
    pub uptime_secs: u64,
    pub nodes: Vec<NodeStatus>,
    pub apis: Vec<CredentialStatus>,
}

/// Compact liveness report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub metrics: CoordinatorMetrics,
    pub nodes: usize,
    pub active_credentials: usize,
}

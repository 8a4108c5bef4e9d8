//! Keyword-based task classification.
//!
//! The classifier lower-cases the message and scans categories in a fixed
//! priority order. The first category with at least one keyword hit wins;
//! later categories are never consulted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;
use tracing::debug;

use crate::RequestContext;

/// Nodes used when no category matches.
pub const DEFAULT_SUGGESTED_NODES: [&str; 2] = ["gpt", "gemini"];

/// Task category inferred from a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Creative,
    Analytical,
    Conversational,
    Technical,
    #[default]
    General,
}

impl TaskType {
    /// Categories in scan order.
    pub const SCAN_ORDER: [Self; 4] =
        [Self::Creative, Self::Analytical, Self::Conversational, Self::Technical];

    /// Keywords that select this category.
    #[must_use]
    pub const fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::Creative => &["write", "story", "poem", "creative", "idea", "imagine", "design"],
            Self::Analytical => &["analyze", "compare", "research", "data", "statistics", "evaluate"],
            Self::Conversational => &["hello", "how are you", "thank", "chat", "hey there"],
            Self::Technical => &["code", "programming", "api", "bug", "server", "algorithm"],
            Self::General => &[],
        }
    }

    /// Node keys suggested for this category.
    #[must_use]
    pub const fn suggested_nodes(self) -> &'static [&'static str] {
        match self {
            Self::Creative => &["gpt", "claude", "gemini"],
            Self::Analytical => &["claude", "perplexity"],
            Self::Technical => &["gpt", "claude"],
            Self::Conversational | Self::General => &DEFAULT_SUGGESTED_NODES,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Creative => write!(f, "creative"),
            Self::Analytical => write!(f, "analytical"),
            Self::Conversational => write!(f, "conversational"),
            Self::Technical => write!(f, "technical"),
            Self::General => write!(f, "general"),
        }
    }
}

/// Result of classifying one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAnalysis {
    pub primary_type: TaskType,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub suggested_nodes: Vec<String>,
    pub complexity: u32,
    pub urgency: String,
    pub estimated_duration: String,
}

impl Default for TaskAnalysis {
    fn default() -> Self {
        Self {
            primary_type: TaskType::General,
            confidence: 0.5,
            suggested_nodes: DEFAULT_SUGGESTED_NODES.iter().map(|k| (*k).to_string()).collect(),
            complexity: 1,
            urgency: "normal".to_string(),
            estimated_duration: "medium".to_string(),
        }
    }
}

/// One post-hoc quality rating for a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluenceRecord {
    pub rating: f64,
    pub note: String,
    pub timestamp: DateTime<Utc>,
}

/// Classifies messages and keeps the influence history.
#[derive(Debug, Default)]
pub struct TaskClassifier {
    influence: RwLock<HashMap<String, Vec<InfluenceRecord>>>,
}

impl TaskClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies `message`.
    ///
    /// `confidence = min(0.9, 0.3 + 0.2 * matches)` for the winning category,
    /// 0.5 for `general`. The request context is accepted for future hints and
    /// does not affect the result.
    #[must_use]
    pub fn analyze(&self, message: &str, _context: &RequestContext) -> TaskAnalysis {
        let lower = message.to_lowercase();
        let mut analysis = TaskAnalysis::default();

        for task_type in TaskType::SCAN_ORDER {
            let matches = task_type.keywords().iter().filter(|kw| lower.contains(*kw)).count();
            if matches > 0 {
                analysis.primary_type = task_type;
                analysis.confidence = 0.2f64.mul_add(matches as f64, 0.3).min(0.9);
                break;
            }
        }

        analysis.suggested_nodes =
            analysis.primary_type.suggested_nodes().iter().map(|k| (*k).to_string()).collect();

        debug!(
            primary_type = %analysis.primary_type,
            confidence = analysis.confidence,
            suggested = ?analysis.suggested_nodes,
            "Task analyzed"
        );

        analysis
    }

    /// Records a quality rating for `node`. Never influences `analyze`.
    pub async fn record_feedback(&self, node: &str, rating: f64, note: impl Into<String>) {
        let record = InfluenceRecord { rating, note: note.into(), timestamp: Utc::now() };
        self.influence.write().await.entry(node.to_string()).or_default().push(record);
    }

    /// Ratings recorded for `node`, oldest first.
    pub async fn feedback_for(&self, node: &str) -> Vec<InfluenceRecord> {
        self.influence.read().await.get(node).cloned().unwrap_or_default()
    }
}

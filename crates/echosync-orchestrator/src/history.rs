//! Bounded in-memory session history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

use crate::classifier::TaskType;

/// One accepted dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub message: String,
    pub primary_type: TaskType,
    pub nodes: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl SessionRecord {
    #[must_use]
    pub fn new(message: impl Into<String>, primary_type: TaskType, nodes: Vec<String>) -> Self {
        Self { id: Uuid::new_v4(), message: message.into(), primary_type, nodes, timestamp: Utc::now() }
    }
}

/// Ring of the most recent session records; the oldest is evicted first.
#[derive(Debug, Clone)]
pub struct SessionHistory {
    records: VecDeque<SessionRecord>,
    limit: usize,
}

impl SessionHistory {
    /// A zero limit is treated as one.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self { records: VecDeque::with_capacity(limit.min(1024)), limit }
    }

    pub fn push(&mut self, record: SessionRecord) {
        while self.records.len() >= self.limit {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<SessionRecord> {
        self.records.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oldest_evicted_at_limit() {
        let mut history = SessionHistory::new(2);
        for message in ["one", "two", "three"] {
            history.push(SessionRecord::new(message, TaskType::General, vec!["gpt".to_string()]));
        }
        let messages: Vec<_> = history.records().into_iter().map(|r| r.message).collect();
        assert_eq!(messages, vec!["two", "three"]);
    }

    #[test]
    fn test_zero_limit_keeps_latest() {
        let mut history = SessionHistory::new(0);
        history.push(SessionRecord::new("a", TaskType::General, vec![]));
        history.push(SessionRecord::new("b", TaskType::General, vec![]));
        assert_eq!(history.len(), 1);
        assert_eq!(history.records()[0].message, "b");
    }
}

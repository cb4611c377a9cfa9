//! Action execution behind an `ActionSink` capability.
//!
//! The default sink journals actions in memory and logs them; integrations
//! with real systems (calendar, payments) implement `ActionSink` themselves.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Action, ExecutionResult};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Invalid action: {0}")]
    Invalid(String),

    #[error("Target system unreachable: {target}")]
    TargetUnreachable { target: String },

    #[error("Action rejected by {target}: {reason}")]
    Rejected { target: String, reason: String },
}

/// Something that can carry out an action.
#[async_trait]
pub trait ActionSink: Send + Sync {
    /// Perform `action`; returns a human-readable confirmation.
    async fn deliver(&self, execution_id: Uuid, action: &Action) -> Result<String, ExecutionError>;

    /// Sink name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// JournalSink
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct JournalEntry {
    pub execution_id: Uuid,
    pub action: Action,
    pub recorded_at: DateTime<Utc>,
}

/// Records every action in a bounded in-memory journal. Always succeeds.
#[derive(Debug)]
pub struct JournalSink {
    capacity: usize,
    entries: Mutex<VecDeque<JournalEntry>>,
}

impl JournalSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn recent(&self, limit: usize) -> Vec<JournalEntry> {
        let entries = match self.entries.lock() {
            Ok(e) => e,
            Err(poisoned) => poisoned.into_inner(),
        };
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }
}

#[async_trait]
impl ActionSink for JournalSink {
    async fn deliver(&self, execution_id: Uuid, action: &Action) -> Result<String, ExecutionError> {
        tracing::info!(
            %execution_id,
            action_type = %action.action_type,
            target = %action.target,
            priority = %action.priority,
            "Executing action"
        );

        let mut entries = match self.entries.lock() {
            Ok(e) => e,
            Err(poisoned) => poisoned.into_inner(),
        };
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(JournalEntry {
            execution_id,
            action: action.clone(),
            recorded_at: Utc::now(),
        });

        Ok(format!("Action {} executed on {}", action.action_type, action.target))
    }

    fn name(&self) -> &str {
        "journal"
    }
}

// ============================================================================
// ActionExecutor
// ============================================================================

#[derive(Clone)]
pub struct ActionExecutor {
    sink: Arc<dyn ActionSink>,
}

impl ActionExecutor {
    pub fn new(sink: Arc<dyn ActionSink>) -> Self {
        Self { sink }
    }

    pub async fn execute(&self, action: Action) -> Result<ExecutionResult, ExecutionError> {
        if action.action_type.trim().is_empty() {
            return Err(ExecutionError::Invalid("action_type must not be empty".to_string()));
        }

        let mut result = ExecutionResult::success(String::new());
        match self.sink.deliver(result.execution_id, &action).await {
            Ok(message) => {
                result.message = message;
                Ok(result)
            }
            Err(e) => {
                tracing::warn!(
                    execution_id = %result.execution_id,
                    sink = self.sink.name(),
                    error = %e,
                    "Action execution failed"
                );
                Err(e)
            }
        }
    }
}

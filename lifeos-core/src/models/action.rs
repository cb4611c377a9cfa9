use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;
use uuid::Uuid;

/// A suggested action. Identity is structural; there is no stored id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub action_type: String,
    pub target: String,
    pub description: String,
    pub priority: Number,
}

/// Acknowledgment returned by `POST /api/execute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: String,
    pub message: String,
    pub execution_id: Uuid,
    pub executed_at: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            execution_id: Uuid::new_v4(),
            executed_at: Utc::now(),
        }
    }
}

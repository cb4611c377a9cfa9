use serde::{Deserialize, Serialize};
use serde_json::Number;

use super::action::Action;

/// Insight text of the neutral fallback returned when the AI core is unavailable.
pub const FALLBACK_INSIGHT: &str =
    "AI Intelligence Core is currently recalibrating. System running in localized safety mode.";

/// Neutral score used for every field of the fallback.
pub const FALLBACK_SCORE: u64 = 50;

/// Alignment status as produced by the upstream model.
///
/// Scores are expected in `[0, 100]` but are passed through as received,
/// integers staying integers and fractions staying fractions.
/// `pending_actions` keeps the upstream order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResult {
    pub score: Number,
    pub health_index: Number,
    pub wealth_index: Number,
    pub focus_index: Number,
    pub insight: String,
    pub pending_actions: Vec<Action>,
}

impl StatusResult {
    pub fn fallback() -> Self {
        Self {
            score: FALLBACK_SCORE.into(),
            health_index: FALLBACK_SCORE.into(),
            wealth_index: FALLBACK_SCORE.into(),
            focus_index: FALLBACK_SCORE.into(),
            insight: FALLBACK_INSIGHT.to_string(),
            pending_actions: Vec::new(),
        }
    }
}

/// Why a status query fell back to the neutral payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DegradeReason {
    /// Missing credential, transport failure, terminal status or exhausted retries.
    Unavailable(String),
    /// The upstream answered but its payload did not match the schema.
    Malformed(String),
}

impl std::fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegradeReason::Unavailable(detail) => write!(f, "upstream unavailable: {}", detail),
            DegradeReason::Malformed(detail) => write!(f, "malformed upstream payload: {}", detail),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusOutcome {
    Live(StatusResult),
    Degraded {
        reason: DegradeReason,
        fallback: StatusResult,
    },
}

impl StatusOutcome {
    pub fn degraded(reason: DegradeReason) -> Self {
        StatusOutcome::Degraded {
            reason,
            fallback: StatusResult::fallback(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StatusOutcome::Degraded { .. })
    }

    pub fn result(&self) -> &StatusResult {
        match self {
            StatusOutcome::Live(result) => result,
            StatusOutcome::Degraded { fallback, .. } => fallback,
        }
    }

    pub fn into_result(self) -> StatusResult {
        match self {
            StatusOutcome::Live(result) => result,
            StatusOutcome::Degraded { fallback, .. } => fallback,
        }
    }
}

//! Status aggregation: user context in, alignment status out.
//!
//! Every failure on this path (missing key, exhausted retries, terminal
//! status, malformed payload) degrades to the neutral fallback. Callers that
//! need to tell live results from fallbacks use [`StatusAggregator::evaluate`].

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::context::ContextStore;
use crate::gemini::{GeminiClient, GenerateContentRequest, UpstreamError};
use crate::history::HistoryLog;
use crate::models::{DegradeReason, StatusOutcome, StatusResult, UserContext};

pub const SYSTEM_INSTRUCTION: &str = "You are LifeOS, a personal operating system that keeps a \
user's health, wealth and focus aligned. Given the user's current context, rate overall life \
alignment from 0 to 100, rate health, wealth and focus from 0 to 100 each, write one short, \
direct insight, and propose concrete actions ordered by priority (highest first). Each action \
names its type in SCREAMING_SNAKE_CASE, the system or area it targets, a one-line description \
and a priority from 1 to 10.";

/// Response schema declared to the provider, in Gemini's OpenAPI subset.
pub fn status_response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "score": { "type": "NUMBER" },
            "health_index": { "type": "NUMBER" },
            "wealth_index": { "type": "NUMBER" },
            "focus_index": { "type": "NUMBER" },
            "insight": { "type": "STRING" },
            "pending_actions": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "action_type": { "type": "STRING" },
                        "target": { "type": "STRING" },
                        "description": { "type": "STRING" },
                        "priority": { "type": "NUMBER" }
                    },
                    "required": ["action_type", "target", "description", "priority"]
                }
            }
        },
        "required": [
            "score",
            "health_index",
            "wealth_index",
            "focus_index",
            "insight",
            "pending_actions"
        ]
    })
}

pub struct StatusAggregator {
    upstream: GeminiClient,
    context: Arc<ContextStore>,
    history: Arc<HistoryLog>,
}

impl StatusAggregator {
    pub fn new(
        upstream: GeminiClient,
        context: Arc<ContextStore>,
        history: Arc<HistoryLog>,
    ) -> Self {
        Self {
            upstream,
            context,
            history,
        }
    }

    pub fn upstream(&self) -> &GeminiClient {
        &self.upstream
    }

    pub fn build_request(&self, context: &UserContext) -> GenerateContentRequest {
        let rendered = serde_json::to_string_pretty(context).unwrap_or_default();
        let prompt = format!(
            "Current user context:\n{}\n\nProduce the LifeOS alignment status.",
            rendered
        );
        GenerateContentRequest::structured(SYSTEM_INSTRUCTION, &prompt, status_response_schema())
    }

    /// One upstream request per call; no caching or coalescing.
    pub async fn evaluate(&self) -> StatusOutcome {
        self.evaluate_inner(None).await
    }

    /// As [`evaluate`](Self::evaluate), abandoning the upstream call when
    /// `cancel` fires.
    pub async fn evaluate_cancellable(&self, cancel: &CancellationToken) -> StatusOutcome {
        self.evaluate_inner(Some(cancel)).await
    }

    /// The status with any degradation flattened into the fallback payload.
    pub async fn status(&self) -> StatusResult {
        self.evaluate().await.into_result()
    }

    async fn evaluate_inner(&self, cancel: Option<&CancellationToken>) -> StatusOutcome {
        let context = self.context.snapshot();
        let request = self.build_request(&context);

        let outcome = match self
            .upstream
            .generate_structured::<StatusResult>(&request, cancel)
            .await
        {
            Ok(result) => {
                tracing::debug!(score = %result.score, actions = result.pending_actions.len(), "Status evaluated");
                StatusOutcome::Live(result)
            }
            Err(e) => {
                let reason = degrade_reason(&e);
                tracing::warn!(reason = %reason, "Status degraded to fallback");
                StatusOutcome::degraded(reason)
            }
        };

        self.history.record(&outcome);
        outcome
    }
}

fn degrade_reason(error: &UpstreamError) -> DegradeReason {
    if error.is_malformed() {
        DegradeReason::Malformed(error.to_string())
    } else {
        DegradeReason::Unavailable(error.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================

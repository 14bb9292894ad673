//! Health and configuration endpoints.

use api::{router, AppState, MockAuthConfig};
use axum_test::TestServer;
use session_core::{ConfigService, SessionConfig};
use std::sync::Arc;

fn server_with(session_config: SessionConfig) -> TestServer {
    let state = AppState::new(
        MockAuthConfig::default(),
        Arc::new(ConfigService::fixed(session_config)),
    );
    TestServer::new(router(state)).expect("Failed to create test server")
}

/// Test /health endpoint returns proper structure
#[tokio::test]
async fn test_health_endpoint_structure() {
    let server = server_with(SessionConfig::default());

    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    for field in ["status", "auth_provider_healthy", "storage_healthy", "active_tokens"] {
        assert!(body.get(field).is_some(), "Response should have '{}' field", field);
    }

    let names: Vec<&str> = body["components"]
        .as_array()
        .expect("components array")
        .iter()
        .filter_map(|c| c["name"].as_str())
        .collect();
    assert_eq!(names, ["auth_provider", "storage"]);

    // Components may not have reported yet in a test process.
    let status = body["status"].as_str().unwrap_or("");
    assert!(
        status == "healthy" || status == "degraded" || status == "unhealthy",
        "Status should be 'healthy', 'degraded', or 'unhealthy', got '{}'",
        status
    );
}

#[tokio::test]
async fn test_live_endpoint() {
    let server = server_with(SessionConfig::default());
    server.get("/health/live").await.assert_status_ok();
}

#[tokio::test]
async fn test_session_config_reflects_service() {
    let mut config = SessionConfig::default();
    config.timeouts.team.session_ms = 60 * 60 * 1000;
    config.activity_debounce_secs = 30;

    let server = server_with(config.clone());
    let response = server.get("/session/config").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["timeouts"]["team"]["session_ms"], 3_600_000);
    assert_eq!(body["activity_debounce_secs"], 30);
    assert_eq!(response.json::<SessionConfig>(), config);
}

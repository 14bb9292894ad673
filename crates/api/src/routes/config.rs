//! Session configuration endpoint.

use axum::{extract::State, Json};
use session_core::SessionConfig;

use crate::state::AppState;

/// GET /session/config - Thresholds and timings clients should apply.
///
/// Reflects the last explicit refresh of the config service.
pub async fn session_config_handler(State(state): State<AppState>) -> Json<SessionConfig> {
    Json(state.session_config.current().as_ref().clone())
}

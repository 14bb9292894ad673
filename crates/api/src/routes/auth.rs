//! Mock auth endpoints.
//!
//! Stand-in for the managed auth provider during local development. Tokens
//! are opaque and live only in this process.

use axum::{extract::State, http::StatusCode, Json};
use session_core::{
    AuthErrorCode, AuthSession, Error, MockLoginRequest, Mobile, RateLimitErrorCode,
    RefreshRequest,
};
use telemetry::metrics;
use tracing::{debug, info, warn};

use crate::extractors::{BearerToken, ClientIp, ValidatedJson};
use crate::response::ApiError;
use crate::state::AppState;

/// POST /auth/mock-login - OTP login against the configured mock OTP.
pub async fn mock_login_handler(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    ValidatedJson(request): ValidatedJson<MockLoginRequest>,
) -> Result<Json<AuthSession>, ApiError> {
    if !state.config.mock_login_enabled {
        return Err(Error::auth(AuthErrorCode::MockLoginDisabled, "Mock login is disabled").into());
    }

    let mobile = Mobile::parse(&request.mobile).inspect_err(|_| {
        metrics().mock_login_failures.inc();
    })?;

    if let Err(wait) = state.rate_limiter.acquire(mobile.as_str()) {
        metrics().rate_limited_requests.inc();
        let retry_after = wait.as_secs_f64().ceil() as u64;
        warn!(
            mobile = %mobile.as_str(),
            client_ip = ?client_ip,
            retry_after,
            "Mock login rate limited"
        );
        return Err(Error::rate_limit(
            RateLimitErrorCode::Exceeded,
            "Too many login attempts",
            Some(retry_after),
        )
        .into());
    }

    if request.otp != state.config.mock_otp {
        metrics().mock_login_failures.inc();
        debug!(mobile = %mobile.as_str(), "Mock login rejected, wrong OTP");
        return Err(Error::auth(AuthErrorCode::InvalidOtp, "Invalid OTP").into());
    }

    let user_type = request.user_type.unwrap_or_default();
    let session = state.tokens.issue(&mobile.user_id(), user_type).await;

    metrics().mock_logins.inc();
    info!(
        user_id = %session.user_id,
        user_type = %user_type,
        client_ip = ?client_ip,
        "Mock login succeeded"
    );

    Ok(Json(session))
}

/// GET /auth/session - Session for the presented access token.
pub async fn session_handler(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<AuthSession>, ApiError> {
    let session = state.tokens.session(&token).await.ok_or_else(|| {
        Error::auth(AuthErrorCode::InvalidToken, "Access token is invalid or expired")
    })?;

    Ok(Json(session))
}

/// POST /auth/refresh - Rotate both tokens.
pub async fn refresh_handler(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RefreshRequest>,
) -> Result<Json<AuthSession>, ApiError> {
    let session = state
        .tokens
        .rotate(&request.refresh_token)
        .await
        .ok_or_else(|| {
            Error::auth(
                AuthErrorCode::InvalidRefreshToken,
                "Refresh token is invalid or expired",
            )
        })?;

    debug!(user_id = %session.user_id, "Rotated tokens");
    Ok(Json(session))
}

/// POST /auth/signout - Revoke the presented token pair.
///
/// Unknown tokens still answer 204.
pub async fn sign_out_handler(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> StatusCode {
    if state.tokens.revoke(&token).await {
        info!("Signed out");
    }
    StatusCode::NO_CONTENT
}

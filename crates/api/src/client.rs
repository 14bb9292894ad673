//! HTTP client for the mock auth service.
//!
//! Holds the current session locally, the way a browser SDK does, and
//! implements `AuthProvider` on top of it.

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Response, StatusCode};
use serde_json::json;
use session_core::{
    AuthErrorCode, AuthProvider, AuthSession, Error, RateLimitErrorCode, RefreshRequest, Result,
    UserType,
};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::response::ErrorResponse;

/// Default request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// `AuthProvider` backed by the mock auth HTTP API.
pub struct HttpAuthProvider {
    /// Service root, always ending in `/`
    base_url: Url,
    http_client: reqwest::Client,
    session: RwLock<Option<AuthSession>>,
}

impl HttpAuthProvider {
    /// Creates a client for the service at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| Error::config(format!("invalid auth URL: {}", e)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            http_client,
            session: RwLock::new(None),
        })
    }

    /// Locally held session, without asking the service.
    pub fn current(&self) -> Option<AuthSession> {
        self.session.read().clone()
    }

    /// Signs in with a mobile number and OTP.
    pub async fn sign_in_with_otp(
        &self,
        mobile: &str,
        otp: &str,
        user_type: Option<UserType>,
    ) -> Result<AuthSession> {
        let response = self
            .http_client
            .post(self.endpoint("auth/mock-login")?)
            .json(&json!({ "mobile": mobile, "otp": otp, "userType": user_type }))
            .send()
            .await
            .map_err(transport_error)?;

        let session: AuthSession = parse_session(response).await?;
        debug!(user_id = %session.user_id, "Signed in with OTP");
        *self.session.write() = Some(session.clone());
        Ok(session)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::internal(format!("invalid endpoint {}: {}", path, e)))
    }

    fn clear(&self) {
        *self.session.write() = None;
    }
}

#[async_trait]
impl AuthProvider for HttpAuthProvider {
    async fn get_session(&self) -> Result<Option<AuthSession>> {
        let Some(current) = self.current() else {
            return Ok(None);
        };

        let response = self
            .http_client
            .get(self.endpoint("auth/session")?)
            .bearer_auth(&current.access_token)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!(user_id = %current.user_id, "Provider no longer recognizes session");
            self.clear();
            return Ok(None);
        }

        let session = parse_session(response).await?;
        Ok(Some(session))
    }

    async fn sign_out(&self) -> Result<()> {
        let Some(current) = self.session.write().take() else {
            return Ok(());
        };

        let response = self
            .http_client
            .post(self.endpoint("auth/signout")?)
            .bearer_auth(&current.access_token)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            debug!(user_id = %current.user_id, "Signed out");
            Ok(())
        } else {
            Err(error_from_response(response).await)
        }
    }

    async fn refresh_session(&self) -> Result<AuthSession> {
        let Some(current) = self.current() else {
            return Err(Error::auth(
                AuthErrorCode::InvalidRefreshToken,
                "No session to refresh",
            ));
        };

        let response = self
            .http_client
            .post(self.endpoint("auth/refresh")?)
            .json(&RefreshRequest {
                refresh_token: current.refresh_token,
            })
            .send()
            .await
            .map_err(transport_error)?;

        match parse_session(response).await {
            Ok(session) => {
                *self.session.write() = Some(session.clone());
                Ok(session)
            }
            Err(e) => {
                if matches!(e, Error::Auth { .. }) {
                    self.clear();
                }
                Err(e)
            }
        }
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    warn!(error = %e, "Auth provider request failed");
    Error::provider_unavailable(e.to_string())
}

async fn parse_session(response: Response) -> Result<AuthSession> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }

    response
        .json()
        .await
        .map_err(|e| Error::provider_unavailable(format!("invalid session response: {}", e)))
}

/// Maps an error response back onto the coded error it was built from.
async fn error_from_response(response: Response) -> Error {
    let status = response.status();
    let retry_after = response
        .headers()
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());

    let body: Option<ErrorResponse> = response.json().await.ok();
    let Some(body) = body else {
        return Error::provider_unavailable(format!("auth service returned {}", status));
    };

    if let Some(code) = AuthErrorCode::from_code(&body.code) {
        return Error::auth(code, body.error);
    }
    if body.code == RateLimitErrorCode::Exceeded.code() {
        return Error::rate_limit(RateLimitErrorCode::Exceeded, body.error, retry_after);
    }
    if status.is_client_error() {
        return Error::validation(body.error);
    }

    Error::provider_unavailable(format!("auth service returned {}: {}", status, body.error))
}

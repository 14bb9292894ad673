//! Authentication provider boundary and mock login wire types.
//!
//! This module provides:
//! - The `AuthProvider` trait the session runtime talks to
//! - Mobile number validation for mock OTP login
//! - Request/response types shared by the mock auth service and its client

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use validator::Validate;

use crate::error::{AuthErrorCode, Error, Result};
use crate::session::UserType;

/// E.164-ish mobile number: optional `+`, 7 to 15 digits.
pub const MOBILE_PATTERN: &str = r"^\+?[0-9]{7,15}$";

static MOBILE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(MOBILE_PATTERN).expect("invalid mobile pattern"));

/// A session as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry, epoch milliseconds.
    pub expires_at: i64,
    #[serde(default)]
    pub user_type: UserType,
}

/// The managed auth provider's session API.
///
/// All calls may fail with a transport error (`AuthProviderUnavailable`) or
/// a coded auth error.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Current session, or `None` when signed out.
    async fn get_session(&self) -> Result<Option<AuthSession>>;

    /// Ends the session with the provider.
    async fn sign_out(&self) -> Result<()>;

    /// Rotates tokens for the current session.
    async fn refresh_session(&self) -> Result<AuthSession>;
}

/// Validated mobile number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mobile(String);

impl Mobile {
    /// Parses a mobile number, ignoring spaces and dashes.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();

        if normalized.is_empty() {
            return Err(Error::auth(
                AuthErrorCode::InvalidMobile,
                "Mobile number is required",
            ));
        }

        if !MOBILE_REGEX.is_match(&normalized) {
            return Err(Error::auth(
                AuthErrorCode::InvalidMobile,
                "Invalid mobile number format",
            ));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Stable user id derived from the number.
    pub fn user_id(&self) -> String {
        format!("mock-{}", self.0.trim_start_matches('+'))
    }
}

/// Mock OTP login request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MockLoginRequest {
    #[validate(length(min = 1, max = 32))]
    pub mobile: String,
    #[validate(length(min = 4, max = 8))]
    pub otp: String,
    #[serde(default)]
    pub user_type: Option<UserType>,
}

/// Token refresh request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

/// Extract a bearer token from an `Authorization` header value.
pub fn extract_bearer_token(auth_header: Option<&str>) -> Result<&str> {
    let Some(header) = auth_header else {
        return Err(Error::auth(AuthErrorCode::MissingToken, "Bearer token is required"));
    };

    match header.strip_prefix("Bearer ").map(str::trim) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(Error::auth(AuthErrorCode::MissingToken, "Bearer token is required")),
    }
}

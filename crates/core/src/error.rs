//! Unified error types for the session guard.
//!
//! Error codes:
//! - AUTH_001-006: Authentication errors (mock auth service)
//! - VALID_001: Validation errors
//! - RATE_001: Rate limit errors
//!
//! The session subsystem itself never treats these as fatal. Provider and
//! metadata failures resolve to "require re-authentication", storage write
//! failures resolve to "no local activity tracking".

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Authentication error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorCode {
    /// AUTH_001: Bearer token is required
    MissingToken,
    /// AUTH_002: Access token is invalid or expired
    InvalidToken,
    /// AUTH_003: One-time password did not match
    InvalidOtp,
    /// AUTH_004: Refresh token is invalid, expired or already rotated
    InvalidRefreshToken,
    /// AUTH_005: Mobile number is malformed
    InvalidMobile,
    /// AUTH_006: Mock login is disabled in this deployment
    MockLoginDisabled,
}

impl AuthErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingToken => "AUTH_001",
            Self::InvalidToken => "AUTH_002",
            Self::InvalidOtp => "AUTH_003",
            Self::InvalidRefreshToken => "AUTH_004",
            Self::InvalidMobile => "AUTH_005",
            Self::MockLoginDisabled => "AUTH_006",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::MissingToken => 401,
            Self::InvalidToken => 401,
            Self::InvalidOtp => 401,
            Self::InvalidRefreshToken => 401,
            Self::InvalidMobile => 400,
            Self::MockLoginDisabled => 403,
        }
    }

    /// Parse a wire code back into an error code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "AUTH_001" => Some(Self::MissingToken),
            "AUTH_002" => Some(Self::InvalidToken),
            "AUTH_003" => Some(Self::InvalidOtp),
            "AUTH_004" => Some(Self::InvalidRefreshToken),
            "AUTH_005" => Some(Self::InvalidMobile),
            "AUTH_006" => Some(Self::MockLoginDisabled),
            _ => None,
        }
    }
}

/// Validation error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorCode {
    /// VALID_001: Malformed request body
    InvalidFormat,
}

impl ValidationErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidFormat => "VALID_001",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        400
    }
}

/// Rate limit error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitErrorCode {
    /// RATE_001: Too many login attempts
    Exceeded,
}

impl RateLimitErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Exceeded => "RATE_001",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        429
    }
}

/// Unified error type for the session guard.
#[derive(Debug, Error)]
pub enum Error {
    /// Authentication error with code.
    #[error("[{code}] {message}")]
    Auth {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    /// Validation error with code.
    #[error("[{code}] {message}")]
    ValidationWithCode {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    /// Rate limit error with code.
    #[error("[{code}] {message}")]
    RateLimit {
        code: &'static str,
        message: String,
        http_status: u16,
        retry_after: Option<u64>,
    },

    /// Network or transport failure talking to the auth provider.
    #[error("auth provider unavailable: {0}")]
    AuthProviderUnavailable(String),

    /// No local session metadata for the user.
    #[error("missing session metadata for user {0}")]
    MissingMetadata(String),

    /// Local storage rejected a write (quota exceeded or disabled).
    #[error("storage write failed: {0}")]
    StorageWriteFailure(String),

    #[error("storage read failed: {0}")]
    StorageReadFailure(String),

    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an authentication error.
    pub fn auth(code: AuthErrorCode, msg: impl Into<String>) -> Self {
        Self::Auth {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    /// Create a validation error with code.
    pub fn validation_code(code: ValidationErrorCode, msg: impl Into<String>) -> Self {
        Self::ValidationWithCode {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    /// Create a rate limit error.
    pub fn rate_limit(
        code: RateLimitErrorCode,
        msg: impl Into<String>,
        retry_after: Option<u64>,
    ) -> Self {
        Self::RateLimit {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
            retry_after,
        }
    }

    pub fn provider_unavailable(msg: impl Into<String>) -> Self {
        Self::AuthProviderUnavailable(msg.into())
    }

    pub fn missing_metadata(user_id: impl Into<String>) -> Self {
        Self::MissingMetadata(user_id.into())
    }

    pub fn storage_write(msg: impl Into<String>) -> Self {
        Self::StorageWriteFailure(msg.into())
    }

    pub fn storage_read(msg: impl Into<String>) -> Self {
        Self::StorageReadFailure(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error means the caller can no longer trust its session.
    ///
    /// Provider transport failures fail closed.
    pub fn invalidates_session(&self) -> bool {
        matches!(
            self,
            Self::Auth { .. }
                | Self::AuthProviderUnavailable(_)
                | Self::MissingMetadata(_)
                | Self::Unauthorized(_)
        )
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Auth { http_status, .. } => *http_status,
            Self::ValidationWithCode { http_status, .. } => *http_status,
            Self::RateLimit { http_status, .. } => *http_status,
            Self::AuthProviderUnavailable(_) => 503,
            Self::MissingMetadata(_) => 401,
            Self::StorageWriteFailure(_) => 500,
            Self::StorageReadFailure(_) => 500,
            Self::InvalidTransition(_) => 409,
            Self::Validation(_) => 400,
            Self::Config(_) => 500,
            Self::Serialization(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Internal(_) => 500,
        }
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::Auth { code, .. } => Some(code),
            Self::ValidationWithCode { code, .. } => Some(code),
            Self::RateLimit { code, .. } => Some(code),
            _ => None,
        }
    }
}

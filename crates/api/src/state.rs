//! Application state shared across handlers.

use crate::middleware::rate_limit::{RateLimitConfig, RateLimiter, SharedRateLimiter};
use chrono::Utc;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use session_core::{AuthSession, ConfigService, SessionConfig, UserType};
use std::sync::Arc;
use std::time::Duration;
use telemetry::metrics;
use tracing::debug;
use uuid::Uuid;

/// Maximum live tokens per cache.
const TOKEN_CACHE_MAX_CAPACITY: u64 = 100_000;

/// Mock auth service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockAuthConfig {
    /// When false, `/auth/mock-login` answers 403
    pub mock_login_enabled: bool,
    /// The only OTP the mock accepts
    pub mock_otp: String,
    /// Access token lifetime, in seconds
    pub access_ttl_secs: u64,
    /// Refresh token lifetime, in seconds
    pub refresh_ttl_secs: u64,
    /// Per-mobile login throttling
    pub rate_limit: RateLimitConfig,
}

impl Default for MockAuthConfig {
    fn default() -> Self {
        Self {
            mock_login_enabled: true,
            mock_otp: "12345".to_string(),
            access_ttl_secs: 60 * 60,
            refresh_ttl_secs: 7 * 24 * 60 * 60,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
struct RefreshGrant {
    user_id: String,
    user_type: UserType,
    access_token: String,
}

/// Issued tokens.
///
/// Each access token maps to its session; each refresh token maps back to
/// the access token it was issued with, so rotation and sign-out revoke
/// both.
#[derive(Clone)]
pub struct TokenStore {
    access: Cache<String, AuthSession>,
    refresh: Cache<String, RefreshGrant>,
    access_ttl: Duration,
}

impl TokenStore {
    pub fn new(access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            access: Cache::builder()
                .max_capacity(TOKEN_CACHE_MAX_CAPACITY)
                .time_to_live(access_ttl)
                .build(),
            refresh: Cache::builder()
                .max_capacity(TOKEN_CACHE_MAX_CAPACITY)
                .time_to_live(refresh_ttl)
                .build(),
            access_ttl,
        }
    }

    /// Issues a fresh token pair.
    pub async fn issue(&self, user_id: &str, user_type: UserType) -> AuthSession {
        let session = AuthSession {
            user_id: user_id.to_string(),
            access_token: new_token(),
            refresh_token: new_token(),
            expires_at: Utc::now().timestamp_millis() + self.access_ttl.as_millis() as i64,
            user_type,
        };

        self.access
            .insert(session.access_token.clone(), session.clone())
            .await;
        self.refresh
            .insert(
                session.refresh_token.clone(),
                RefreshGrant {
                    user_id: session.user_id.clone(),
                    user_type,
                    access_token: session.access_token.clone(),
                },
            )
            .await;

        self.sync_gauge().await;
        debug!(user_id, "Issued token pair");
        session
    }

    /// Session for a live access token.
    pub async fn session(&self, access_token: &str) -> Option<AuthSession> {
        let session = self.access.get(access_token).await?;
        (session.expires_at > Utc::now().timestamp_millis()).then_some(session)
    }

    /// Swaps a refresh token for a new pair. The old pair stops working.
    pub async fn rotate(&self, refresh_token: &str) -> Option<AuthSession> {
        let grant = self.refresh.remove(refresh_token).await?;
        self.access.invalidate(&grant.access_token).await;
        Some(self.issue(&grant.user_id, grant.user_type).await)
    }

    /// Revokes an access token and its refresh token. Returns false if the
    /// token was not live.
    pub async fn revoke(&self, access_token: &str) -> bool {
        let Some(session) = self.access.remove(access_token).await else {
            return false;
        };
        self.refresh.invalidate(&session.refresh_token).await;
        self.sync_gauge().await;
        true
    }

    async fn sync_gauge(&self) {
        self.access.run_pending_tasks().await;
        metrics().active_tokens.set(self.access.entry_count());
    }
}

fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<MockAuthConfig>,
    /// Session thresholds served to clients
    pub session_config: Arc<ConfigService>,
    pub tokens: TokenStore,
    /// Login attempts, keyed by normalized mobile number
    pub rate_limiter: SharedRateLimiter,
}

impl AppState {
    pub fn new(config: MockAuthConfig, session_config: Arc<ConfigService>) -> Self {
        Self {
            session_config,
            tokens: TokenStore::new(
                Duration::from_secs(config.access_ttl_secs),
                Duration::from_secs(config.refresh_ttl_secs),
            ),
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limit.clone())),
            config: Arc::new(config),
        }
    }

    /// Start the rate limiter cleanup background task.
    /// Returns a handle that can be used to cancel the task.
    pub fn start_rate_limiter_cleanup(&self) -> tokio::task::JoinHandle<()> {
        let rate_limiter = self.rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300)); // 5 minutes
            loop {
                interval.tick().await;
                rate_limiter.cleanup_stale();
            }
        })
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(
            MockAuthConfig::default(),
            Arc::new(ConfigService::fixed(SessionConfig::default())),
        )
    }
}

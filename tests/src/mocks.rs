//! Mock implementations for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use session_core::{AuthErrorCode, AuthProvider, AuthSession, Error, Result, UserType};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::fixtures::auth_session;

/// In-memory auth provider.
///
/// Implements the same `AuthProvider` trait as `HttpAuthProvider`, with
/// switches to simulate an unreachable provider or a failing refresh, and
/// call counters for asserting what the session runtime did.
#[derive(Clone, Default)]
pub struct MockAuthProvider {
    session: Arc<Mutex<Option<AuthSession>>>,
    /// Simulate transport failures on every call if set.
    should_fail: Arc<Mutex<bool>>,
    /// Simulate a rejected refresh token if set.
    refresh_should_fail: Arc<Mutex<bool>>,
    /// Sign-out drops the session first, then waits this long before
    /// returning, like a client clearing its token before the network call.
    sign_out_delay: Arc<Mutex<Option<Duration>>>,
    get_session_calls: Arc<AtomicUsize>,
    sign_out_calls: Arc<AtomicUsize>,
    refresh_calls: Arc<AtomicUsize>,
}

impl MockAuthProvider {
    /// Provider with no session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that already holds a session for `user_id`.
    pub fn signed_in(user_id: &str, user_type: UserType) -> Self {
        let provider = Self::new();
        provider.set_session(Some(auth_session(user_id, user_type)));
        provider
    }

    pub fn set_session(&self, session: Option<AuthSession>) {
        *self.session.lock() = session;
    }

    pub fn has_session(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Set failure mode for testing an unreachable provider.
    pub fn set_should_fail(&self, fail: bool) {
        *self.should_fail.lock() = fail;
    }

    pub fn set_refresh_should_fail(&self, fail: bool) {
        *self.refresh_should_fail.lock() = fail;
    }

    pub fn set_sign_out_delay(&self, delay: Duration) {
        *self.sign_out_delay.lock() = Some(delay);
    }

    pub fn get_session_calls(&self) -> usize {
        self.get_session_calls.load(Ordering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<()> {
        if *self.should_fail.lock() {
            return Err(Error::provider_unavailable("mock provider unreachable"));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for MockAuthProvider {
    async fn get_session(&self) -> Result<Option<AuthSession>> {
        self.get_session_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Ok(self.session.lock().clone())
    }

    async fn sign_out(&self) -> Result<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        self.set_session(None);

        let delay = *self.sign_out_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn refresh_session(&self) -> Result<AuthSession> {
        let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.check_reachable()?;

        if *self.refresh_should_fail.lock() {
            self.set_session(None);
            return Err(Error::auth(
                AuthErrorCode::InvalidRefreshToken,
                "mock refresh rejected",
            ));
        }

        let mut session = self.session.lock();
        let current = session.as_mut().ok_or_else(|| {
            Error::auth(AuthErrorCode::InvalidRefreshToken, "no session to refresh")
        })?;

        current.access_token = format!("at-{}-{}", current.user_id, call);
        current.refresh_token = format!("rt-{}-{}", current.user_id, call);
        Ok(current.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_tracks_calls() {
        let mock = MockAuthProvider::signed_in("u1", UserType::Regular);

        assert!(mock.get_session().await.unwrap().is_some());
        let refreshed = mock.refresh_session().await.unwrap();
        assert_eq!(refreshed.access_token, "at-u1-1");

        mock.sign_out().await.unwrap();
        assert!(!mock.has_session());
        assert!(mock.get_session().await.unwrap().is_none());

        assert_eq!(mock.get_session_calls(), 2);
        assert_eq!(mock.sign_out_calls(), 1);
        assert_eq!(mock.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_provider_failure_mode() {
        let mock = MockAuthProvider::signed_in("u1", UserType::Regular);
        mock.set_should_fail(true);

        assert!(matches!(
            mock.get_session().await,
            Err(Error::AuthProviderUnavailable(_))
        ));
        assert!(mock.has_session());
    }
}

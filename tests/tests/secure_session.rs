//! Secure session behavior: provider checks, metadata checks, idle sign-out
//! and refresh.
//!
//! Runs with paused tokio time. Interval ticks and idle timers advance with
//! `tokio::time::sleep`; metadata age advances with the manual clock.

use integration_tests::fixtures::{HOUR_MS, MINUTE_MS};
use integration_tests::mocks::MockAuthProvider;
use integration_tests::setup::SessionHarness;
use session_core::{
    Error, ExpiryReason, InvalidationCause, MemoryStorage, SessionConfig, SessionState, UserType,
};
use session_runtime::{ActiveSession, InteractionKind};
use std::sync::Arc;
use std::time::Duration;

const MINUTE: Duration = Duration::from_secs(60);

async fn wait_until(session: &ActiveSession, target: SessionState) {
    let mut rx = session.secure().watch();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|state| *state == target))
        .await
        .expect("timed out waiting for session state")
        .expect("session state channel closed");
}

#[tokio::test(start_paused = true)]
async fn test_first_check_validates_session() {
    let h = SessionHarness::signed_in("u1", UserType::Regular);
    let session = h.manager.establish("u1", UserType::Regular).unwrap();
    assert_eq!(session.state(), SessionState::Validating);

    wait_until(&session, SessionState::Valid).await;
    assert_eq!(h.provider.get_session_calls(), 1);
    assert!(session.is_tracking_activity());
    assert!(session.secure().invalidation_cause().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_provider_error_requires_reauthentication() {
    let h = SessionHarness::signed_in("u1", UserType::Regular);
    h.provider.set_should_fail(true);

    let session = h.manager.establish("u1", UserType::Regular).unwrap();
    wait_until(&session, SessionState::Unauthenticated).await;

    assert_eq!(
        session.secure().invalidation_cause(),
        Some(InvalidationCause::ProviderUnavailable)
    );
    assert!(h.store().load("u1").unwrap().is_none());
    assert_eq!(h.provider.sign_out_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_missing_provider_session_requires_reauthentication() {
    let h = SessionHarness::with(
        MockAuthProvider::new(),
        Arc::new(MemoryStorage::new()),
        SessionConfig::default(),
    );

    let session = h.manager.establish("u1", UserType::Regular).unwrap();
    wait_until(&session, SessionState::Unauthenticated).await;

    assert_eq!(
        session.secure().invalidation_cause(),
        Some(InvalidationCause::NoProviderSession)
    );
    assert!(h.store().load("u1").unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_provider_checked_every_interval() {
    let h = SessionHarness::signed_in("u1", UserType::Regular);
    let session = h.manager.establish("u1", UserType::Regular).unwrap();
    wait_until(&session, SessionState::Valid).await;

    tokio::time::sleep(3 * MINUTE + Duration::from_secs(1)).await;
    assert_eq!(h.provider.get_session_calls(), 4);

    // Provider drops the session server-side; the next check notices.
    h.provider.set_session(None);
    tokio::time::sleep(MINUTE).await;
    assert_eq!(session.state(), SessionState::Unauthenticated);
}

#[tokio::test(start_paused = true)]
async fn test_idle_window_forces_sign_out() {
    let h = SessionHarness::signed_in("u1", UserType::Regular);
    let session = h.manager.establish("u1", UserType::Regular).unwrap();
    wait_until(&session, SessionState::Valid).await;

    tokio::time::sleep(29 * MINUTE).await;
    assert!(session.secure().is_valid());

    tokio::time::sleep(2 * MINUTE).await;
    assert_eq!(session.state(), SessionState::Unauthenticated);
    assert_eq!(
        session.secure().invalidation_cause(),
        Some(InvalidationCause::IdleTimeout)
    );
    assert_eq!(h.provider.sign_out_calls(), 1);
    assert!(!h.provider.has_session());
    assert!(h.store().load("u1").unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_interaction_defers_idle_sign_out() {
    let h = SessionHarness::signed_in("u1", UserType::Regular);
    let session = h.manager.establish("u1", UserType::Regular).unwrap();
    wait_until(&session, SessionState::Valid).await;

    for _ in 0..5 {
        tokio::time::sleep(10 * MINUTE).await;
        h.clock.advance(10 * MINUTE_MS);
        h.events.emit(InteractionKind::PointerDown);
    }

    tokio::time::sleep(29 * MINUTE).await;
    assert!(session.secure().is_valid());
    assert_eq!(h.provider.sign_out_calls(), 0);

    tokio::time::sleep(2 * MINUTE).await;
    assert_eq!(
        session.secure().invalidation_cause(),
        Some(InvalidationCause::IdleTimeout)
    );
}

#[tokio::test(start_paused = true)]
async fn test_team_session_age_expiry_signs_out() {
    let h = SessionHarness::signed_in("u1", UserType::Team);
    let session = h.manager.establish("u1", UserType::Team).unwrap();
    wait_until(&session, SessionState::Valid).await;

    h.clock.advance(9 * HOUR_MS);
    tokio::time::sleep(MINUTE + Duration::from_secs(1)).await;

    assert_eq!(session.state(), SessionState::Unauthenticated);
    assert_eq!(
        session.secure().invalidation_cause(),
        Some(InvalidationCause::MetadataExpired(ExpiryReason::Age))
    );
    assert_eq!(h.provider.sign_out_calls(), 1);
    assert!(h.store().load("u1").unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_team_inactivity_expiry_signs_out() {
    let h = SessionHarness::signed_in("u1", UserType::Team);
    let session = h.manager.establish("u1", UserType::Team).unwrap();
    wait_until(&session, SessionState::Valid).await;

    h.clock.advance(3 * HOUR_MS);
    tokio::time::sleep(MINUTE + Duration::from_secs(1)).await;

    assert_eq!(
        session.secure().invalidation_cause(),
        Some(InvalidationCause::MetadataExpired(ExpiryReason::Inactivity))
    );
}

#[tokio::test(start_paused = true)]
async fn test_regular_user_survives_team_limits() {
    let h = SessionHarness::signed_in("u1", UserType::Regular);
    let session = h.manager.establish("u1", UserType::Regular).unwrap();
    wait_until(&session, SessionState::Valid).await;

    // Past the team inactivity cap, inside the regular one.
    h.clock.advance(3 * HOUR_MS);
    tokio::time::sleep(MINUTE + Duration::from_secs(1)).await;

    assert!(session.secure().is_valid());
}

#[tokio::test(start_paused = true)]
async fn test_metadata_removed_elsewhere_signs_out() {
    let h = SessionHarness::signed_in("u1", UserType::Regular);
    let session = h.manager.establish("u1", UserType::Regular).unwrap();
    wait_until(&session, SessionState::Valid).await;

    // Another tab logged out.
    h.store().remove("u1").unwrap();
    tokio::time::sleep(MINUTE + Duration::from_secs(1)).await;

    assert_eq!(
        session.secure().invalidation_cause(),
        Some(InvalidationCause::MetadataMissing)
    );
    assert_eq!(h.provider.sign_out_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_resets_idle_clock() {
    let h = SessionHarness::signed_in("u1", UserType::Regular);
    let session = h.manager.establish("u1", UserType::Regular).unwrap();
    wait_until(&session, SessionState::Valid).await;

    tokio::time::sleep(20 * MINUTE).await;
    let refreshed = session.secure().refresh_session().await.unwrap();
    assert_eq!(refreshed.access_token, "at-u1-1");
    assert_eq!(h.provider.refresh_calls(), 1);

    // 40 minutes since mount, 20 since the refresh.
    tokio::time::sleep(20 * MINUTE).await;
    assert!(session.secure().is_valid());

    tokio::time::sleep(11 * MINUTE).await;
    assert_eq!(
        session.secure().invalidation_cause(),
        Some(InvalidationCause::IdleTimeout)
    );
}

#[tokio::test(start_paused = true)]
async fn test_refresh_failure_invalidates() {
    let h = SessionHarness::signed_in("u1", UserType::Regular);
    let session = h.manager.establish("u1", UserType::Regular).unwrap();
    wait_until(&session, SessionState::Valid).await;

    h.provider.set_refresh_should_fail(true);
    let err = session.secure().refresh_session().await.unwrap_err();
    assert_eq!(err.error_code(), Some("AUTH_004"));

    assert_eq!(session.state(), SessionState::Unauthenticated);
    assert_eq!(
        session.secure().invalidation_cause(),
        Some(InvalidationCause::RefreshFailed)
    );
    assert!(h.store().load("u1").unwrap().is_none());

    // Nothing left to refresh.
    let err = session.secure().refresh_session().await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));
    assert_eq!(h.provider.refresh_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_watch_observes_transitions() {
    let h = SessionHarness::signed_in("u1", UserType::Regular);
    let session = h.manager.establish("u1", UserType::Regular).unwrap();
    let mut rx = session.secure().watch();

    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), SessionState::Valid);

    h.provider.set_session(None);
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), SessionState::Unauthenticated);
}

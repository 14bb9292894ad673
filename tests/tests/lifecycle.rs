//! Login, logout and resume.

use integration_tests::fixtures::{HOUR_MS, START_MS};
use integration_tests::mocks::MockAuthProvider;
use integration_tests::setup::SessionHarness;
use session_core::limits::{DEFAULT_STORAGE_QUOTA_BYTES, STORAGE_KEY_PREFIX};
use session_core::{
    ConfigService, Error, FileStorage, KeyValueStorage, ManualClock, MemoryStorage,
    SessionConfig, SessionMetadata, SessionState, UserType,
};
use session_runtime::{ActivityEvents, SessionManager};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_login_writes_metadata() {
    let h = SessionHarness::signed_in("u1", UserType::Team);
    let session = h.manager.establish("u1", UserType::Team).unwrap();

    let key = format!("{}u1", STORAGE_KEY_PREFIX);
    let raw = h.storage.get(&key).unwrap().expect("metadata written");
    let stored: SessionMetadata = serde_json::from_str(&raw).unwrap();

    assert_eq!(stored.user_id, "u1");
    assert_eq!(stored.user_type, UserType::Team);
    assert_eq!(stored.created_at, START_MS);
    assert_eq!(stored.last_activity, START_MS);
    assert_eq!(stored.storage_key, key);
    assert_eq!(session.metadata(), Some(&stored));

    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["userType"], "team");
    assert!(value.get("lastActivity").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_login_without_storage_still_validates() {
    let storage = Arc::new(MemoryStorage::new());
    storage.set_disabled(true);
    let h = SessionHarness::with(
        MockAuthProvider::signed_in("u1", UserType::Regular),
        storage,
        SessionConfig::default(),
    );

    let session = h.manager.establish("u1", UserType::Regular).unwrap();
    assert!(session.metadata().is_none());
    assert!(!session.is_tracking_activity());

    // One tick is enough for the provider check.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(session.state(), SessionState::Valid);
}

#[tokio::test(start_paused = true)]
async fn test_logout_tears_down() {
    let h = SessionHarness::signed_in("u1", UserType::Regular);
    let session = h.manager.establish("u1", UserType::Regular).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.events.listener_count(), 2);

    session.logout().await;

    assert_eq!(h.provider.sign_out_calls(), 1);
    assert!(!h.provider.has_session());
    assert!(h.store().load("u1").unwrap().is_none());
    assert_eq!(h.events.listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_logout_survives_provider_failure() {
    let h = SessionHarness::signed_in("u1", UserType::Regular);
    let session = h.manager.establish("u1", UserType::Regular).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    h.provider.set_should_fail(true);
    session.logout().await;

    assert!(h.store().load("u1").unwrap().is_none());
    assert_eq!(h.events.listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_logout_stops_validation_before_sign_out() {
    let h = SessionHarness::signed_in("u1", UserType::Regular);
    let session = h.manager.establish("u1", UserType::Regular).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.provider.get_session_calls(), 1);

    // Sign-out spans several validation intervals.
    h.provider.set_sign_out_delay(Duration::from_secs(5 * 60));
    let mut rx = session.secure().watch();
    session.logout().await;

    assert_eq!(h.provider.get_session_calls(), 1);
    assert_eq!(h.provider.sign_out_calls(), 1);
    assert_eq!(*rx.borrow_and_update(), SessionState::Unauthenticated);
    assert!(h.store().load("u1").unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_resume_valid_session() {
    let h = SessionHarness::signed_in("u1", UserType::Regular);
    h.store()
        .create("u1", UserType::Regular, START_MS - HOUR_MS)
        .unwrap();

    let session = h.manager.resume("u1").await.unwrap();
    assert!(session.is_tracking_activity());
    assert_eq!(session.metadata().unwrap().created_at, START_MS - HOUR_MS);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(session.secure().is_valid());
}

#[tokio::test(start_paused = true)]
async fn test_resume_without_metadata() {
    let h = SessionHarness::signed_in("u1", UserType::Regular);

    let err = h.manager.resume("u1").await.err().unwrap();
    assert!(matches!(err, Error::MissingMetadata(_)));
    assert!(err.invalidates_session());
}

#[tokio::test(start_paused = true)]
async fn test_resume_expired_metadata_signs_out() {
    let h = SessionHarness::signed_in("u1", UserType::Regular);
    h.store()
        .create("u1", UserType::Regular, START_MS - 25 * HOUR_MS)
        .unwrap();

    let err = h.manager.resume("u1").await.err().unwrap();
    assert!(matches!(err, Error::Unauthorized(_)));
    assert!(h.store().load("u1").unwrap().is_none());
    assert_eq!(h.provider.sign_out_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_resume_without_provider_session() {
    let h = SessionHarness::with(
        MockAuthProvider::new(),
        Arc::new(MemoryStorage::new()),
        SessionConfig::default(),
    );
    h.store().create("u1", UserType::Regular, START_MS).unwrap();

    let err = h.manager.resume("u1").await.err().unwrap();
    assert!(matches!(err, Error::Unauthorized(_)));
    assert!(h.store().load("u1").unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_resume_with_unreachable_provider() {
    let h = SessionHarness::signed_in("u1", UserType::Regular);
    h.store().create("u1", UserType::Regular, START_MS).unwrap();
    h.provider.set_should_fail(true);

    let err = h.manager.resume("u1").await.err().unwrap();
    assert!(matches!(err, Error::AuthProviderUnavailable(_)));
}

#[test]
fn test_config_refresh_is_explicit() {
    let team_hours = Arc::new(AtomicBool::new(false));
    let shorter = team_hours.clone();
    let service = ConfigService::new(move || -> session_core::Result<SessionConfig> {
        let mut config = SessionConfig::default();
        if shorter.load(Ordering::SeqCst) {
            config.timeouts.team.session_ms = HOUR_MS;
        }
        Ok(config)
    })
    .unwrap();

    team_hours.store(true, Ordering::SeqCst);
    assert_eq!(service.current().timeouts.team.session_ms, 8 * HOUR_MS);

    service.refresh().unwrap();
    assert_eq!(service.current().timeouts.team.session_ms, HOUR_MS);
}

/// Two tabs over one on-disk store: a session established in one tab can be
/// resumed in the other, and logout in either clears it for both.
#[tokio::test(start_paused = true)]
async fn test_tabs_share_file_storage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local_storage.json");
    let provider = MockAuthProvider::signed_in("u1", UserType::Regular);
    let config = ConfigService::fixed(SessionConfig::default());
    let clock = ManualClock::new(START_MS);

    let tab = || {
        SessionManager::new(
            Arc::new(provider.clone()),
            Arc::new(FileStorage::new(&path, DEFAULT_STORAGE_QUOTA_BYTES)),
            ActivityEvents::new(),
            &config,
            Arc::new(clock.clone()),
        )
    };
    let first = tab();
    let second = tab();

    let session = first.establish("u1", UserType::Regular).unwrap();
    let resumed = second.resume("u1").await.unwrap();
    assert_eq!(resumed.metadata(), session.metadata());

    session.logout().await;
    assert!(second.store().load("u1").unwrap().is_none());
    resumed.logout().await;
}

//! Common test setup functions.

use api::{router, AppState, MockAuthConfig};
use session_core::{
    AuthProvider, ConfigService, ManualClock, MemoryStorage, SessionConfig, SessionMetadataStore,
    SharedStorage, UserType,
};
use session_runtime::{ActivityEvents, SessionManager};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::fixtures::START_MS;
use crate::mocks::MockAuthProvider;

/// One browser tab: mock provider, in-memory storage, a manual clock and the
/// session manager wired over them.
///
/// Timer-driven behavior is exercised with `#[tokio::test(start_paused = true)]`;
/// the manual clock stands in for wall-clock time in metadata.
pub struct SessionHarness {
    pub provider: MockAuthProvider,
    pub storage: Arc<MemoryStorage>,
    pub events: ActivityEvents,
    pub clock: ManualClock,
    pub manager: SessionManager,
}

impl SessionHarness {
    /// Harness whose provider holds a session for `user_id`.
    pub fn signed_in(user_id: &str, user_type: UserType) -> Self {
        Self::with(
            MockAuthProvider::signed_in(user_id, user_type),
            Arc::new(MemoryStorage::new()),
            SessionConfig::default(),
        )
    }

    pub fn with(
        provider: MockAuthProvider,
        storage: Arc<MemoryStorage>,
        config: SessionConfig,
    ) -> Self {
        telemetry::init_test_tracing();

        let events = ActivityEvents::new();
        let clock = ManualClock::new(START_MS);
        let manager = SessionManager::new(
            Arc::new(provider.clone()) as Arc<dyn AuthProvider>,
            storage.clone() as SharedStorage,
            events.clone(),
            &ConfigService::fixed(config),
            Arc::new(clock.clone()),
        );

        Self {
            provider,
            storage,
            events,
            clock,
            manager,
        }
    }

    pub fn store(&self) -> &SessionMetadataStore {
        self.manager.store()
    }
}

/// A mock auth service listening on an ephemeral local port.
pub struct TestAuthServer {
    pub addr: SocketAddr,
    pub state: AppState,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl TestAuthServer {
    pub async fn start() -> Self {
        Self::start_with(MockAuthConfig::default()).await
    }

    pub async fn start_with(config: MockAuthConfig) -> Self {
        telemetry::init_test_tracing();

        let state = AppState::new(
            config,
            Arc::new(ConfigService::fixed(SessionConfig::default())),
        );
        let app = router(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("No local address");

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Test server failed");
        });

        Self {
            addr,
            state,
            shutdown,
            handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Shuts down and waits for open connections to close.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.await;
    }
}

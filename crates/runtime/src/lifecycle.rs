//! Login and logout.
//!
//! Login writes session metadata and mounts the activity monitor and secure
//! session. Logout tears both down, signs out of the provider and deletes
//! the metadata.

use session_core::{
    AuthProvider, ConfigService, Error, Result, SessionConfig, SessionEvent, SessionMetadata,
    SessionMetadataStore, SessionState, SessionValidity, SharedClock, SharedStorage, UserType,
};
use std::sync::Arc;
use telemetry::health;
use tracing::{info, warn};

use crate::activity_monitor::ActivityMonitor;
use crate::events::ActivityEvents;
use crate::secure_session::{MetadataGuard, SecureSession, SecureSessionOptions};

/// Establishes and resumes sessions for one tab.
pub struct SessionManager {
    provider: Arc<dyn AuthProvider>,
    store: SessionMetadataStore,
    events: ActivityEvents,
    config: Arc<SessionConfig>,
    clock: SharedClock,
}

impl SessionManager {
    /// Builds a manager from the current configuration.
    ///
    /// Later config refreshes apply to managers built after the refresh.
    pub fn new(
        provider: Arc<dyn AuthProvider>,
        storage: SharedStorage,
        events: ActivityEvents,
        config: &ConfigService,
        clock: SharedClock,
    ) -> Self {
        let config = config.current();
        let store = SessionMetadataStore::new(
            storage,
            config.storage_key_prefix.clone(),
            config.timeouts,
        );

        Self {
            provider,
            store,
            events,
            config,
            clock,
        }
    }

    pub fn store(&self) -> &SessionMetadataStore {
        &self.store
    }

    /// Starts guarding a session the provider just issued.
    ///
    /// If metadata cannot be written, the session still starts but without
    /// local activity tracking or metadata checks.
    pub fn establish(&self, user_id: &str, user_type: UserType) -> Result<ActiveSession> {
        SessionState::Unauthenticated.transition(SessionEvent::Login)?;

        let metadata = match self.store.create(user_id, user_type, self.clock.now_ms()) {
            Ok(metadata) => {
                health().storage.set_healthy();
                Some(metadata)
            }
            Err(e) => {
                health().storage.set_unhealthy(e.to_string());
                warn!(user_id, error = %e, "Could not store session metadata, local tracking disabled");
                None
            }
        };

        info!(user_id, user_type = %user_type, tracked = metadata.is_some(), "Session established");
        Ok(self.mount(user_id, metadata))
    }

    /// Resumes a session from stored metadata, e.g. after a page reload.
    ///
    /// Expired or missing metadata is removed and reported as an error; the
    /// caller must send the user back through login.
    pub async fn resume(&self, user_id: &str) -> Result<ActiveSession> {
        match self.store.check(user_id, self.clock.now_ms()) {
            SessionValidity::Valid => {}
            SessionValidity::Missing => return Err(Error::missing_metadata(user_id)),
            SessionValidity::Expired(reason) => {
                if let Err(e) = self.store.remove(user_id) {
                    warn!(user_id, error = %e, "Failed to remove expired session metadata");
                }
                if let Err(e) = self.provider.sign_out().await {
                    warn!(user_id, error = %e, "Provider sign-out failed for expired session");
                }
                return Err(Error::unauthorized(format!(
                    "session expired ({:?})",
                    reason
                )));
            }
        }

        if self.provider.get_session().await?.is_none() {
            if let Err(e) = self.store.remove(user_id) {
                warn!(user_id, error = %e, "Failed to remove orphaned session metadata");
            }
            return Err(Error::unauthorized("provider has no session"));
        }

        let metadata = self.store.load(user_id).ok().flatten();
        info!(user_id, "Session resumed");
        Ok(self.mount(user_id, metadata))
    }

    fn mount(&self, user_id: &str, metadata: Option<SessionMetadata>) -> ActiveSession {
        let options = SecureSessionOptions::from(self.config.as_ref());

        let (monitor, guard) = match &metadata {
            Some(_) => (
                Some(ActivityMonitor::mount(
                    &self.events,
                    self.store.clone(),
                    user_id,
                    self.config.activity_debounce(),
                    self.clock.clone(),
                )),
                Some(MetadataGuard {
                    store: self.store.clone(),
                    user_id: user_id.to_string(),
                    clock: self.clock.clone(),
                }),
            ),
            None => (None, None),
        };

        let secure = SecureSession::mount(self.provider.clone(), &self.events, guard, options);

        ActiveSession {
            user_id: user_id.to_string(),
            metadata,
            monitor,
            secure,
            provider: self.provider.clone(),
            store: self.store.clone(),
        }
    }
}

/// A signed-in tab.
pub struct ActiveSession {
    user_id: String,
    metadata: Option<SessionMetadata>,
    monitor: Option<ActivityMonitor>,
    secure: SecureSession,
    provider: Arc<dyn AuthProvider>,
    store: SessionMetadataStore,
}

impl ActiveSession {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Metadata as written at establishment, if storage accepted it.
    pub fn metadata(&self) -> Option<&SessionMetadata> {
        self.metadata.as_ref()
    }

    /// Whether activity is being recorded locally.
    pub fn is_tracking_activity(&self) -> bool {
        self.monitor.as_ref().is_some_and(ActivityMonitor::is_mounted)
    }

    pub fn state(&self) -> SessionState {
        self.secure.state()
    }

    pub fn secure(&self) -> &SecureSession {
        &self.secure
    }

    /// Signs out and tears everything down. Provider and storage failures
    /// are logged; the local session ends regardless.
    ///
    /// Validation stops before the provider is asked to sign out, so a check
    /// racing the sign-out cannot record a different invalidation cause.
    pub async fn logout(self) {
        if let Some(monitor) = self.monitor {
            monitor.unmount().await;
        }

        self.secure.mark_signed_out().await;
        self.secure.unmount().await;

        if let Err(e) = self.provider.sign_out().await {
            warn!(user_id = %self.user_id, error = %e, "Provider sign-out failed during logout");
        }

        if let Err(e) = self.store.remove(&self.user_id) {
            warn!(user_id = %self.user_id, error = %e, "Failed to remove session metadata");
        }

        info!(user_id = %self.user_id, "Logged out");
    }
}

//! Secure session: keeps the local session state in step with the provider.
//!
//! While mounted, one task:
//! - asks the provider for its session on every check interval (the first
//!   check runs immediately),
//! - optionally re-checks local metadata against the timeout policy,
//! - forces a provider sign-out once the idle window passes without
//!   interaction.
//!
//! Every failure resolves to `Unauthenticated`; nothing here returns an
//! error the host has to handle to stay safe.

use parking_lot::Mutex;
use session_core::{
    AuthProvider, AuthSession, Error, InvalidationCause, Result, SessionConfig, SessionEvent,
    SessionMetadataStore, SessionState, SessionValidity, SharedClock,
};
use std::sync::Arc;
use std::time::Duration;
use telemetry::{health, metrics};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::events::{ActivityEvents, Subscription, ACTIVITY_EVENTS};

/// Timing for a secure session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecureSessionOptions {
    /// How often to ask the provider for its session
    pub check_interval: Duration,
    /// Idle time before a forced sign-out
    pub inactivity_window: Duration,
}

impl Default for SecureSessionOptions {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for SecureSessionOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            check_interval: config.validation_interval(),
            inactivity_window: config.inactivity_window(),
        }
    }
}

/// Local metadata to re-check on every interval.
#[derive(Clone)]
pub struct MetadataGuard {
    pub store: SessionMetadataStore,
    pub user_id: String,
    pub clock: SharedClock,
}

enum Command {
    ResetActivity,
}

struct Shared {
    provider: Arc<dyn AuthProvider>,
    guard: Option<MetadataGuard>,
    state: watch::Sender<SessionState>,
    cause: Mutex<Option<InvalidationCause>>,
}

impl Shared {
    fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn apply(&self, event: SessionEvent) -> SessionState {
        self.state.send_if_modified(|state| match state.transition(event) {
            Ok(next) if next != *state => {
                debug!(from = ?*state, to = ?next, ?event, "Session state changed");
                *state = next;
                true
            }
            Ok(_) => false,
            Err(e) => {
                debug!(error = %e, "Ignoring session event");
                false
            }
        });
        self.state()
    }

    /// Drops the session locally, optionally signing out of the provider.
    async fn invalidate(&self, cause: InvalidationCause, sign_out: bool) {
        if !self.state().is_authenticated() {
            return;
        }

        if sign_out {
            metrics().forced_sign_outs.inc();
            if let Err(e) = self.provider.sign_out().await {
                warn!(error = %e, ?cause, "Provider sign-out failed during forced logout");
            }
        }

        if let Some(guard) = &self.guard {
            if let Err(e) = guard.store.remove(&guard.user_id) {
                warn!(user_id = %guard.user_id, error = %e, "Failed to remove session metadata");
            }
        }

        *self.cause.lock() = Some(cause);
        self.apply(SessionEvent::Expired(cause));
        info!(?cause, "Session invalidated");
    }

    /// One validation pass. Returns whether the session is still valid.
    async fn validate(&self) -> bool {
        if !self.state().is_authenticated() {
            return false;
        }

        metrics().validations.inc();
        let started = std::time::Instant::now();
        let result = self.provider.get_session().await;
        metrics()
            .provider_latency_ms
            .observe(started.elapsed().as_millis() as u64);

        match result {
            Ok(Some(_)) => health().auth_provider.set_healthy(),
            Ok(None) => {
                metrics().validation_failures.inc();
                self.invalidate(InvalidationCause::NoProviderSession, false)
                    .await;
                return false;
            }
            Err(e) => {
                metrics().validation_failures.inc();
                if matches!(e, Error::AuthProviderUnavailable(_)) {
                    health().auth_provider.set_unhealthy(e.to_string());
                }
                warn!(error = %e, "Session validation failed");
                self.invalidate(InvalidationCause::ProviderUnavailable, false)
                    .await;
                return false;
            }
        }

        if let Some(guard) = &self.guard {
            let cause = match guard.store.check(&guard.user_id, guard.clock.now_ms()) {
                SessionValidity::Valid => None,
                SessionValidity::Expired(reason) => Some(InvalidationCause::MetadataExpired(reason)),
                SessionValidity::Missing => Some(InvalidationCause::MetadataMissing),
            };

            if let Some(cause) = cause {
                self.invalidate(cause, true).await;
                return false;
            }
        }

        self.apply(SessionEvent::Validated).is_valid()
    }
}

/// A mounted secure session.
pub struct SecureSession {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
    handle: Option<JoinHandle<()>>,
}

impl SecureSession {
    /// Starts validating a freshly established session.
    pub fn mount(
        provider: Arc<dyn AuthProvider>,
        events: &ActivityEvents,
        guard: Option<MetadataGuard>,
        options: SecureSessionOptions,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Validating);
        let (commands, command_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            provider,
            guard,
            state,
            cause: Mutex::new(None),
        });

        let task = SessionTask {
            shared: shared.clone(),
            subscription: events.subscribe(&ACTIVITY_EVENTS),
            commands: command_rx,
            options,
        };

        Self {
            shared,
            commands,
            handle: Some(tokio::spawn(task.run())),
        }
    }

    /// Current local state.
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn is_valid(&self) -> bool {
        self.state().is_valid()
    }

    /// Receiver that observes every state change.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Why the session was last invalidated, if it was.
    pub fn invalidation_cause(&self) -> Option<InvalidationCause> {
        *self.shared.cause.lock()
    }

    /// Asks the provider to rotate tokens.
    ///
    /// Success resets the idle clock. Failure invalidates the session.
    pub async fn refresh_session(&self) -> Result<AuthSession> {
        if !self.state().is_authenticated() {
            return Err(Error::unauthorized("no active session to refresh"));
        }

        metrics().refreshes.inc();
        match self.shared.provider.refresh_session().await {
            Ok(session) => {
                let _ = self.commands.send(Command::ResetActivity);
                self.shared.apply(SessionEvent::Validated);
                debug!(user_id = %session.user_id, "Session refreshed");
                Ok(session)
            }
            Err(e) => {
                metrics().refresh_failures.inc();
                warn!(error = %e, "Session refresh failed");
                self.shared
                    .invalidate(InvalidationCause::RefreshFailed, false)
                    .await;
                Err(e)
            }
        }
    }

    /// Marks the session signed out without touching the provider.
    pub(crate) async fn mark_signed_out(&self) {
        self.shared
            .invalidate(InvalidationCause::SignedOut, false)
            .await;
    }

    /// Stops validation and removes listeners.
    pub async fn unmount(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for SecureSession {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

struct SessionTask {
    shared: Arc<Shared>,
    subscription: Subscription,
    commands: mpsc::UnboundedReceiver<Command>,
    options: SecureSessionOptions,
}

impl SessionTask {
    async fn run(mut self) {
        let mut ticker = interval(self.options.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let idle = sleep(self.options.inactivity_window);
        tokio::pin!(idle);

        let mut listening = true;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.shared.validate().await {
                        break;
                    }
                }
                () = &mut idle => {
                    info!(
                        window_secs = self.options.inactivity_window.as_secs(),
                        "Idle window elapsed, forcing sign-out"
                    );
                    self.shared.invalidate(InvalidationCause::IdleTimeout, true).await;
                    break;
                }
                event = self.subscription.recv(), if listening => match event {
                    Some(_) => {
                        idle.as_mut().reset(Instant::now() + self.options.inactivity_window);
                        if self.shared.state().is_valid() {
                            self.shared.apply(SessionEvent::Activity);
                        }
                    }
                    None => listening = false,
                },
                Some(command) = self.commands.recv() => match command {
                    Command::ResetActivity => {
                        idle.as_mut().reset(Instant::now() + self.options.inactivity_window);
                    }
                },
            }

            if !self.shared.state().is_authenticated() {
                break;
            }
        }

        debug!("Secure session task stopped");
    }
}

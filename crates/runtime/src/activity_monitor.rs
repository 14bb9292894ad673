//! Debounced activity tracking.
//!
//! The first interaction arms a timer; interactions inside the window are
//! coalesced; when the timer fires, the latest interaction time is written
//! once. Writes are therefore at least one debounce window apart.

use session_core::{Error, SessionMetadataStore, SharedClock};
use std::time::Duration;
use telemetry::{health, metrics};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace, warn};

use crate::events::{ActivityEvents, Subscription, ACTIVITY_EVENTS};

/// A mounted activity monitor.
///
/// Listeners and any pending write live exactly as long as this handle.
pub struct ActivityMonitor {
    user_id: String,
    handle: Option<JoinHandle<()>>,
}

impl ActivityMonitor {
    /// Subscribes to the activity events and starts tracking for `user_id`.
    pub fn mount(
        events: &ActivityEvents,
        store: SessionMetadataStore,
        user_id: impl Into<String>,
        debounce: Duration,
        clock: SharedClock,
    ) -> Self {
        let user_id = user_id.into();
        let task = MonitorTask {
            subscription: events.subscribe(&ACTIVITY_EVENTS),
            store,
            user_id: user_id.clone(),
            debounce,
            clock,
        };

        metrics().monitors_mounted.inc();
        debug!(user_id = %user_id, debounce_secs = debounce.as_secs(), "Activity monitor mounted");

        Self {
            user_id,
            handle: Some(tokio::spawn(task.run())),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_mounted(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Removes the listener and cancels any pending write.
    pub async fn unmount(mut self) {
        if let Some(handle) = self.release() {
            let _ = handle.await;
        }
        debug!(user_id = %self.user_id, "Activity monitor unmounted");
    }

    fn release(&mut self) -> Option<JoinHandle<()>> {
        let handle = self.handle.take()?;
        handle.abort();
        metrics().monitors_mounted.dec();
        Some(handle)
    }
}

impl Drop for ActivityMonitor {
    fn drop(&mut self) {
        self.release();
    }
}

struct MonitorTask {
    subscription: Subscription,
    store: SessionMetadataStore,
    user_id: String,
    debounce: Duration,
    clock: SharedClock,
}

impl MonitorTask {
    async fn run(mut self) {
        let timer = sleep(self.debounce);
        tokio::pin!(timer);

        let mut armed = false;
        let mut listening = true;
        let mut latest_ms = 0;

        loop {
            tokio::select! {
                event = self.subscription.recv(), if listening => match event {
                    Some(kind) => {
                        metrics().activity_events.inc();
                        latest_ms = latest_ms.max(self.clock.now_ms());
                        trace!(event = kind.dom_name(), "Activity observed");

                        if !armed {
                            timer.as_mut().reset(Instant::now() + self.debounce);
                            armed = true;
                        }
                    }
                    None => {
                        listening = false;
                        if !armed {
                            break;
                        }
                    }
                },
                () = &mut timer, if armed => {
                    armed = false;
                    self.write(latest_ms);
                    if !listening {
                        break;
                    }
                }
            }
        }
    }

    fn write(&self, at_ms: i64) {
        match self.store.update_last_activity(&self.user_id, at_ms) {
            Ok(true) => {
                metrics().activity_writes.inc();
                health().storage.set_healthy();
                trace!(user_id = %self.user_id, at_ms, "Recorded activity");
            }
            Ok(false) => {
                trace!(user_id = %self.user_id, at_ms, "Activity not newer than stored value");
            }
            Err(Error::MissingMetadata(_)) => {
                debug!(user_id = %self.user_id, "No session metadata, activity not recorded");
            }
            Err(e) => {
                metrics().activity_write_failures.inc();
                health().storage.set_unhealthy(e.to_string());
                warn!(
                    user_id = %self.user_id,
                    error = %e,
                    "Failed to record activity, continuing without local tracking"
                );
            }
        }
    }
}

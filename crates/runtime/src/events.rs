//! Interaction event bus.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::trace;

/// Events buffered per listener before slow listeners start lagging.
const EVENT_BUFFER: usize = 256;

/// User interactions that count as activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    PointerDown,
    KeyDown,
    Scroll,
    TouchStart,
    Click,
}

impl InteractionKind {
    /// DOM event name.
    pub fn dom_name(&self) -> &'static str {
        match self {
            Self::PointerDown => "pointerdown",
            Self::KeyDown => "keydown",
            Self::Scroll => "scroll",
            Self::TouchStart => "touchstart",
            Self::Click => "click",
        }
    }
}

/// The fixed set of events the monitors listen to.
pub const ACTIVITY_EVENTS: [InteractionKind; 5] = [
    InteractionKind::PointerDown,
    InteractionKind::KeyDown,
    InteractionKind::Scroll,
    InteractionKind::TouchStart,
    InteractionKind::Click,
];

/// Document-level event bus.
///
/// Cloning shares the bus. Listeners are removed by dropping their
/// `Subscription`.
#[derive(Debug, Clone)]
pub struct ActivityEvents {
    tx: broadcast::Sender<InteractionKind>,
}

impl Default for ActivityEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER);
        Self { tx }
    }

    /// Dispatches an event. Returns how many listeners received it.
    pub fn emit(&self, kind: InteractionKind) -> usize {
        self.tx.send(kind).unwrap_or(0)
    }

    /// Registers a listener for `kinds`.
    pub fn subscribe(&self, kinds: &[InteractionKind]) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            kinds: kinds.to_vec(),
        }
    }

    /// Number of live listeners.
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A registered listener.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<InteractionKind>,
    kinds: Vec<InteractionKind>,
}

impl Subscription {
    /// Next event of a subscribed kind, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<InteractionKind> {
        loop {
            match self.rx.recv().await {
                Ok(kind) if self.kinds.contains(&kind) => return Some(kind),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    trace!(skipped, "Listener lagged behind event bus");
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

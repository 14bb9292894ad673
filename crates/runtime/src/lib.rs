//! Session runtime: the tasks that keep a signed-in tab honest.
//!
//! - Interaction event bus (the DOM event system stand-in)
//! - Activity monitor (debounced last-activity writes)
//! - Secure session (periodic provider checks, idle sign-out, refresh)
//! - Lifecycle (login establishes, logout tears down)

pub mod activity_monitor;
pub mod events;
pub mod lifecycle;
pub mod secure_session;

pub use activity_monitor::ActivityMonitor;
pub use events::*;
pub use lifecycle::*;
pub use secure_session::*;

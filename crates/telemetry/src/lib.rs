//! Telemetry for the session guard: structured logging, in-process metrics,
//! and component health.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;

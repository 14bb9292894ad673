//! Core types for the Looplly session guard.
//!
//! Session metadata, the validity checker, the per-tab state machine, local
//! storage, and the auth provider boundary. Nothing here spawns tasks.

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod limits;
pub mod policy;
pub mod session;
pub mod state;
pub mod storage;
pub mod store;
pub mod validity;

pub use auth::*;
pub use clock::*;
pub use config::*;
pub use error::{AuthErrorCode, Error, RateLimitErrorCode, Result, ValidationErrorCode};
pub use policy::*;
pub use session::*;
pub use state::*;
pub use storage::*;
pub use store::*;
pub use validity::*;

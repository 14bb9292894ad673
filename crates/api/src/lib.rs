//! HTTP layer for the session guard.
//!
//! - A mock auth service (OTP login, session lookup, token rotation,
//!   sign-out) for local development and tests
//! - `HttpAuthProvider`, the `AuthProvider` implementation that talks to it

pub mod client;
pub mod extractors;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod state;

pub use client::HttpAuthProvider;
pub use routes::router;
pub use state::{AppState, MockAuthConfig};

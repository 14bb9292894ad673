//! Timeout and timing defaults for the session guard.
//!
//! Two user classes carry different timeout policies. Team accounts are
//! operator staff on shared machines and get the tighter caps.
//!
//! These are defaults only; `SessionConfig` can override every value.

use std::time::Duration;

const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;

// === Absolute session caps ===

/// Team sessions end 8 hours after login no matter what.
pub const TEAM_SESSION_TIMEOUT_MS: i64 = 8 * HOUR_MS;

/// Regular sessions end 24 hours after login.
pub const REGULAR_SESSION_TIMEOUT_MS: i64 = 24 * HOUR_MS;

// === Inactivity caps ===

/// Team sessions end after 2 hours without recorded activity.
pub const TEAM_INACTIVITY_TIMEOUT_MS: i64 = 2 * HOUR_MS;

/// Regular sessions end after 4 hours without recorded activity.
pub const REGULAR_INACTIVITY_TIMEOUT_MS: i64 = 4 * HOUR_MS;

// === Runtime timing ===

/// Minimum spacing between activity writes to storage.
pub const ACTIVITY_DEBOUNCE: Duration = Duration::from_secs(60);

/// How often the secure session re-validates with the auth provider.
pub const VALIDATION_INTERVAL: Duration = Duration::from_secs(60);

/// Idle window after which the secure session forces a sign-out.
pub const INACTIVITY_WINDOW: Duration = Duration::from_secs(30 * 60);

// === Storage ===

/// Key prefix for session metadata records in local storage.
pub const STORAGE_KEY_PREFIX: &str = "looplly_session_meta_";

/// Practical local storage quota (5MB, the low end of browser limits).
pub const DEFAULT_STORAGE_QUOTA_BYTES: usize = 5 * 1024 * 1024;

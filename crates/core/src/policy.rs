//! Timeout thresholds per user type.

use serde::{Deserialize, Serialize};

use crate::limits::{
    REGULAR_INACTIVITY_TIMEOUT_MS, REGULAR_SESSION_TIMEOUT_MS, TEAM_INACTIVITY_TIMEOUT_MS,
    TEAM_SESSION_TIMEOUT_MS,
};
use crate::session::UserType;

/// Absolute and inactivity caps for one user class, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutThresholds {
    /// Maximum session age.
    pub session_ms: i64,
    /// Maximum time since last activity.
    pub inactivity_ms: i64,
}

impl TimeoutThresholds {
    pub const fn new(session_ms: i64, inactivity_ms: i64) -> Self {
        Self {
            session_ms,
            inactivity_ms,
        }
    }

    pub const fn team() -> Self {
        Self::new(TEAM_SESSION_TIMEOUT_MS, TEAM_INACTIVITY_TIMEOUT_MS)
    }

    pub const fn regular() -> Self {
        Self::new(REGULAR_SESSION_TIMEOUT_MS, REGULAR_INACTIVITY_TIMEOUT_MS)
    }
}

/// Thresholds for every user class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutPolicy {
    #[serde(default = "TimeoutThresholds::team")]
    pub team: TimeoutThresholds,
    #[serde(default = "TimeoutThresholds::regular")]
    pub regular: TimeoutThresholds,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            team: TimeoutThresholds::team(),
            regular: TimeoutThresholds::regular(),
        }
    }
}

impl TimeoutPolicy {
    /// Thresholds for a user type. Client accounts share the regular caps.
    pub fn thresholds(&self, user_type: UserType) -> TimeoutThresholds {
        match user_type {
            UserType::Team => self.team,
            UserType::Regular | UserType::Client => self.regular,
        }
    }
}

//! Session validity checking.
//!
//! A pure decision function: no I/O, no clocks, no side effects. Callers act
//! on the result (typically by forcing a sign-out).

use serde::{Deserialize, Serialize};

use crate::policy::TimeoutPolicy;
use crate::session::SessionMetadata;

/// Why a session is considered expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryReason {
    /// Absolute session age cap exceeded.
    Age,
    /// Too long since the last recorded activity.
    Inactivity,
}

/// Outcome of a validity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum SessionValidity {
    Valid,
    Expired(ExpiryReason),
    Missing,
}

impl SessionValidity {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Decides whether a session is still usable at `now_ms`.
///
/// The age cap is checked before the inactivity cap, so a session over both
/// reports `Expired(Age)`. Values equal to a threshold are still valid.
pub fn check_session_validity(
    metadata: Option<&SessionMetadata>,
    now_ms: i64,
    policy: &TimeoutPolicy,
) -> SessionValidity {
    let Some(metadata) = metadata else {
        return SessionValidity::Missing;
    };

    let thresholds = policy.thresholds(metadata.user_type);

    if metadata.age_ms(now_ms) > thresholds.session_ms {
        return SessionValidity::Expired(ExpiryReason::Age);
    }

    if metadata.inactivity_ms(now_ms) > thresholds.inactivity_ms {
        return SessionValidity::Expired(ExpiryReason::Inactivity);
    }

    SessionValidity::Valid
}

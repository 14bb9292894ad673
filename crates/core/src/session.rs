//! Session metadata types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Account class, which selects the timeout policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    #[default]
    Regular,
    Team,
    Client,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Team => "team",
            Self::Client => "client",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "regular" => Ok(Self::Regular),
            "team" => Ok(Self::Team),
            "client" => Ok(Self::Client),
            other => Err(Error::validation(format!("unknown user type: {}", other))),
        }
    }
}

/// Client-local record of a session's creation and last activity.
///
/// Advisory only: the auth provider's own token validation is the real
/// authorization boundary. Invariant: `last_activity >= created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub user_id: String,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub last_activity: i64,
    pub storage_key: String,
    pub user_type: UserType,
}

impl SessionMetadata {
    /// Creates metadata for a session established at `now_ms`.
    pub fn new(
        user_id: impl Into<String>,
        user_type: UserType,
        storage_key: impl Into<String>,
        now_ms: i64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            created_at: now_ms,
            last_activity: now_ms,
            storage_key: storage_key.into(),
            user_type,
        }
    }

    /// Moves `last_activity` forward to `at_ms`.
    ///
    /// Returns false (and leaves the record untouched) when `at_ms` is not
    /// newer than the current value.
    pub fn touch(&mut self, at_ms: i64) -> bool {
        if at_ms <= self.last_activity {
            return false;
        }
        self.last_activity = at_ms;
        true
    }

    /// Milliseconds since the session was created. Saturates on
    /// out-of-range timestamps read back from storage.
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.created_at)
    }

    /// Milliseconds since the last recorded activity.
    pub fn inactivity_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.last_activity)
    }

    /// Whether the record satisfies `last_activity >= created_at`.
    pub fn is_consistent(&self) -> bool {
        self.last_activity >= self.created_at
    }
}

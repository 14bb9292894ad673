//! Per-tab session state machine.
//!
//! ```text
//! Unauthenticated --Login--> Validating --Validated--> Valid
//! Valid --Activity--> Valid
//! Validating|Valid --Expired|ValidationFailed|Logout--> Unauthenticated
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::validity::ExpiryReason;

/// Local session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Unauthenticated,
    Validating,
    Valid,
}

impl SessionState {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Unauthenticated)
    }

    /// Applies an event, returning the next state.
    pub fn transition(self, event: SessionEvent) -> Result<SessionState> {
        use SessionEvent as E;
        use SessionState as S;

        match (self, event) {
            (S::Unauthenticated, E::Login) => Ok(S::Validating),
            (S::Validating, E::Validated) | (S::Valid, E::Validated) => Ok(S::Valid),
            (S::Valid, E::Activity) => Ok(S::Valid),
            (S::Validating | S::Valid, E::Expired(_) | E::ValidationFailed | E::Logout) => {
                Ok(S::Unauthenticated)
            }
            (state, event) => Err(Error::InvalidTransition(format!(
                "{:?} does not accept {:?}",
                state, event
            ))),
        }
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Login,
    Validated,
    Activity,
    Expired(InvalidationCause),
    ValidationFailed,
    Logout,
}

/// Why a session was invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationCause {
    /// Local metadata exceeded a timeout threshold.
    MetadataExpired(ExpiryReason),
    /// No local metadata for the user.
    MetadataMissing,
    /// Idle window elapsed without interaction.
    IdleTimeout,
    /// The provider reports no session.
    NoProviderSession,
    /// The provider could not be reached.
    ProviderUnavailable,
    /// Token rotation failed.
    RefreshFailed,
    /// The user logged out.
    SignedOut,
}

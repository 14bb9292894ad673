//! Session metadata persistence on top of local storage.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::policy::TimeoutPolicy;
use crate::session::{SessionMetadata, UserType};
use crate::storage::SharedStorage;
use crate::validity::{check_session_validity, SessionValidity};

/// Reads and writes `SessionMetadata` records.
#[derive(Clone)]
pub struct SessionMetadataStore {
    storage: SharedStorage,
    key_prefix: String,
    policy: TimeoutPolicy,
}

impl SessionMetadataStore {
    pub fn new(storage: SharedStorage, key_prefix: impl Into<String>, policy: TimeoutPolicy) -> Self {
        Self {
            storage,
            key_prefix: key_prefix.into(),
            policy,
        }
    }

    /// Storage key for a user's record.
    pub fn storage_key(&self, user_id: &str) -> String {
        format!("{}{}", self.key_prefix, user_id)
    }

    /// Writes a fresh record for a session established at `now_ms`.
    pub fn create(&self, user_id: &str, user_type: UserType, now_ms: i64) -> Result<SessionMetadata> {
        let metadata = SessionMetadata::new(user_id, user_type, self.storage_key(user_id), now_ms);
        self.save(&metadata)?;
        debug!(user_id, user_type = %user_type, "Created session metadata");
        Ok(metadata)
    }

    /// Loads a user's record, if any.
    pub fn load(&self, user_id: &str) -> Result<Option<SessionMetadata>> {
        let key = self.storage_key(user_id);
        match self.storage.get(&key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Moves `last_activity` forward to `at_ms`.
    ///
    /// Older timestamps leave the record untouched and skip the write.
    /// Returns whether a write happened.
    pub fn update_last_activity(&self, user_id: &str, at_ms: i64) -> Result<bool> {
        let mut metadata = self
            .load(user_id)?
            .ok_or_else(|| Error::missing_metadata(user_id))?;

        if !metadata.touch(at_ms) {
            return Ok(false);
        }

        self.save(&metadata)?;
        Ok(true)
    }

    /// Deletes a user's record.
    pub fn remove(&self, user_id: &str) -> Result<()> {
        self.storage.remove(&self.storage_key(user_id))
    }

    /// Loads and checks a user's record.
    ///
    /// Never fails: unreadable or corrupt records count as missing.
    pub fn check(&self, user_id: &str, now_ms: i64) -> SessionValidity {
        let metadata = match self.load(user_id) {
            Ok(Some(metadata)) if !metadata.is_consistent() => {
                warn!(
                    user_id,
                    created_at = metadata.created_at,
                    last_activity = metadata.last_activity,
                    "Inconsistent session metadata, treating as missing"
                );
                None
            }
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(user_id, error = %e, "Unreadable session metadata, treating as missing");
                None
            }
        };

        if metadata.is_none() {
            debug!(user_id, "No session metadata");
        }

        check_session_validity(metadata.as_ref(), now_ms, &self.policy)
    }

    fn save(&self, metadata: &SessionMetadata) -> Result<()> {
        let raw = serde_json::to_string(metadata)?;
        self.storage.set(&metadata.storage_key, &raw)
    }
}

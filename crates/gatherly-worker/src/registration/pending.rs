use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::clock::SharedClock;
use super::error::ServiceError;

const KEY_PREFIX: &str = "pending-registration:";

/// A sign-up that has not been confirmed yet.
///
/// The password is held as submitted until promotion; it is only hashed when the
/// durable user is created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRegistration {
    pub email: String,
    pub password: String,
    pub verification_code: String,
    /// Written on every (re)issue; no lockout reads it.
    pub attempts: u32,
}

impl PendingRegistration {
    pub fn new(email: &str, password: &str, verification_code: String) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
            verification_code,
            attempts: 0,
        }
    }

    pub fn store_key(email: &str) -> String {
        format!("{KEY_PREFIX}{email}")
    }

    pub fn to_value(&self) -> Result<String, ServiceError> {
        serde_json::to_string(self).map_err(ServiceError::unavailable)
    }

    pub fn from_value(value: &str) -> Result<Self, ServiceError> {
        serde_json::from_str(value)
            .map_err(|e| ServiceError::Unavailable(format!("malformed pending registration: {e}")))
    }
}

/// Expiring key-value store holding opaque pending registration records.
///
/// Expiry is entirely the store's job; a record past its TTL must read as absent.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait PendingRegistrationStore {
    async fn put(&self, key: &str, value: String, ttl_secs: u64) -> Result<(), ServiceError>;

    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError>;

    async fn delete(&self, key: &str) -> Result<(), ServiceError>;
}

struct Entry {
    value: String,
    expires_at: i64,
}

/// Process-local store for tests and local development. Expired records read as
/// absent and are pruned on the next write.
pub struct InMemoryPendingStore {
    clock: SharedClock,
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryPendingStore {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of records that have not expired yet.
    pub fn live_len(&self) -> usize {
        let now = self.clock.now_ts();
        self.entries
            .lock()
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl PendingRegistrationStore for InMemoryPendingStore {
    async fn put(&self, key: &str, value: String, ttl_secs: u64) -> Result<(), ServiceError> {
        let ttl = i64::try_from(ttl_secs).map_err(ServiceError::unavailable)?;
        let now = self.clock.now_ts();
        let mut entries = self.entries.lock();
        // Abandoned sign-ups are never read again; drop them on the write path.
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: now.saturating_add(ttl),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        let now = self.clock.now_ts();
        let mut entries = self.entries.lock();
        let found = entries
            .get(key)
            .map(|entry| (entry.expires_at > now, entry.value.clone()));
        match found {
            Some((true, value)) => Ok(Some(value)),
            Some((false, _)) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), ServiceError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

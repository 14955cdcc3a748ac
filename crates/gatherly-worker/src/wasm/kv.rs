use worker::kv::KvStore;
use worker::{Env, Result};

use crate::registration::{PendingRegistrationStore, ServiceError};

pub const PENDING_REGISTRATIONS_BINDING: &str = "PENDING_REGISTRATIONS";

/// Pending registrations in Workers KV; expiry is KV's `expiration_ttl`.
pub struct KvPendingStore {
    kv: KvStore,
}

impl KvPendingStore {
    pub fn from_env(env: &Env) -> Result<Self> {
        Ok(Self {
            kv: env.kv(PENDING_REGISTRATIONS_BINDING)?,
        })
    }
}

#[async_trait::async_trait(?Send)]
impl PendingRegistrationStore for KvPendingStore {
    async fn put(&self, key: &str, value: String, ttl_secs: u64) -> std::result::Result<(), ServiceError> {
        self.kv
            .put(key, value)
            .map_err(ServiceError::unavailable)?
            .expiration_ttl(ttl_secs)
            .execute()
            .await
            .map_err(ServiceError::unavailable)
    }

    async fn get(&self, key: &str) -> std::result::Result<Option<String>, ServiceError> {
        self.kv
            .get(key)
            .text()
            .await
            .map_err(ServiceError::unavailable)
    }

    async fn delete(&self, key: &str) -> std::result::Result<(), ServiceError> {
        self.kv.delete(key).await.map_err(ServiceError::unavailable)
    }
}

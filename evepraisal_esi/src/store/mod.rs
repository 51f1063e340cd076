mod keyring_store;
mod memory;

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::StoreError;

pub use self::{keyring_store::KeyringCredentialStore, memory::MemoryCredentialStore};

/// Key-value contract for credential persistence.
///
/// Implementations must surface a missing or expired key as an error from
/// [`CredentialStore::get`] rather than an empty value. Operations are atomic
/// per key only; nothing spans keys.
pub trait CredentialStore {
    fn get(&self, key: &str) -> Result<String, StoreError>;
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

impl<S> CredentialStore for Arc<S>
where
    S: CredentialStore + ?Sized,
{
    fn get(&self, key: &str) -> Result<String, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        (**self).set(key, value, ttl)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct StoredSecret {
    pub value: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredSecret {
    pub fn new(value: &str, ttl: Option<Duration>, now: DateTime<Utc>) -> Self {
        // A TTL past chrono's range still expires, at the latest instant it can name.
        let expires_at = ttl.map(|ttl| {
            chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|ttl| now.checked_add_signed(ttl))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });
        Self {
            value: value.to_owned(),
            expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .map(|expires_at| expires_at <= now)
            .unwrap_or(false)
    }
}

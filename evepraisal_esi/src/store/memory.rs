use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use super::{CredentialStore, StoredSecret};
use crate::{
    StoreError,
    clock::{Clock, SystemClock},
};

/// Process-local store with per-key expiry. Useful for tests and for
/// applications that re-provision credentials at startup.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore<T = SystemClock> {
    entries: Mutex<HashMap<String, StoredSecret>>,
    clock: T,
}

impl MemoryCredentialStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<T> MemoryCredentialStore<T>
where
    T: Clock,
{
    pub fn with_clock(clock: T) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Whether `key` is present and unexpired.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_ok()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, StoredSecret>> {
        match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<T> CredentialStore for MemoryCredentialStore<T>
where
    T: Clock,
{
    fn get(&self, key: &str) -> Result<String, StoreError> {
        let now = self.clock.now();
        let mut entries = self.entries();
        let Some(secret) = entries.get(key) else {
            return Err(StoreError::missing(key));
        };
        if !secret.is_expired(now) {
            return Ok(secret.value.clone());
        }

        entries.remove(key);
        Err(StoreError::expired(key))
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let secret = StoredSecret::new(value, ttl, self.clock.now());
        self.entries().insert(key.to_owned(), secret);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries().remove(key);
        Ok(())
    }
}

use std::time::Duration;

use keyring::Entry;

use super::{CredentialStore, StoredSecret};
use crate::{
    StoreError,
    clock::{Clock, SystemClock},
};

/// Credential store backed by the OS keyring.
///
/// The keyring has no expiry of its own, so every value is wrapped in a JSON
/// envelope carrying its deadline; expired entries are deleted on read.
#[derive(Clone, Debug)]
pub struct KeyringCredentialStore<T = SystemClock> {
    service: String,
    account_prefix: String,
    clock: T,
}

impl KeyringCredentialStore<SystemClock> {
    pub fn new(service: impl Into<String>, account_prefix: impl Into<String>) -> Self {
        Self::with_clock(service, account_prefix, SystemClock)
    }
}

impl<T> KeyringCredentialStore<T>
where
    T: Clock,
{
    pub fn with_clock(
        service: impl Into<String>,
        account_prefix: impl Into<String>,
        clock: T,
    ) -> Self {
        Self {
            service: service.into(),
            account_prefix: account_prefix.into(),
            clock,
        }
    }

    fn account_for_key(&self, key: &str) -> String {
        format!("{}:{key}", self.account_prefix)
    }

    fn entry_for_key(&self, key: &str) -> Result<Entry, StoreError> {
        Ok(Entry::new(&self.service, &self.account_for_key(key))?)
    }
}

impl<T> CredentialStore for KeyringCredentialStore<T>
where
    T: Clock,
{
    fn get(&self, key: &str) -> Result<String, StoreError> {
        let entry = self.entry_for_key(key)?;
        let raw = match entry.get_password() {
            Ok(raw) => raw,
            Err(keyring::Error::NoEntry) => return Err(StoreError::missing(key)),
            Err(err) => return Err(err.into()),
        };

        let secret: StoredSecret = serde_json::from_str(&raw)?;
        if secret.is_expired(self.clock.now()) {
            log::trace!("keyring entry {key} expired; removing");
            match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(err) => return Err(err.into()),
            }
            return Err(StoreError::expired(key));
        }

        Ok(secret.value)
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let entry = self.entry_for_key(key)?;
        let raw = serde_json::to_string(&StoredSecret::new(value, ttl, self.clock.now()))?;
        entry.set_password(&raw)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let entry = self.entry_for_key(key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

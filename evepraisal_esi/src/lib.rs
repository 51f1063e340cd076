pub mod auth;
pub mod clock;
pub mod config;
pub mod errors;
pub mod fetcher;
pub mod store;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use auth::{CredentialStatus, TokenManager};
pub use clock::{Clock, SystemClock};
pub use config::{CredentialKeys, EsiConfig, RetryPolicy};
pub use errors::{EsiError, EsiResult, StoreError};
pub use fetcher::Fetcher;
pub use store::{CredentialStore, KeyringCredentialStore, MemoryCredentialStore};
pub use tokio_util::sync::CancellationToken;
pub use transport::{HttpTransport, RetryingTransport};

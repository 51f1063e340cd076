mod manager;
mod types;

pub use manager::TokenManager;
pub use types::{CredentialStatus, RefreshRequest, TokenResponse};

use serde::{Deserialize, Serialize};

pub const REFRESH_GRANT_TYPE: &str = "refresh_token";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshRequest {
    pub grant_type: String,
    pub refresh_token: String,
}

impl RefreshRequest {
    pub fn new(refresh_token: impl Into<String>) -> Self {
        Self {
            grant_type: REFRESH_GRANT_TYPE.to_string(),
            refresh_token: refresh_token.into(),
        }
    }
}

/// Body of a successful token exchange.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    pub expires_in: u64,
    pub refresh_token: String,
}

/// Which credential entries are currently readable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CredentialStatus {
    pub access_token: bool,
    pub refresh_token: bool,
    pub api_auth: bool,
}

impl CredentialStatus {
    pub fn can_refresh(&self) -> bool {
        self.refresh_token && self.api_auth
    }
}

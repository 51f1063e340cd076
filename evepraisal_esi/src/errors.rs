use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

pub type EsiResult<T> = Result<T, EsiError>;

#[derive(Debug, Error)]
pub enum EsiError {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("http transport failed")]
    Transport(#[from] reqwest::Error),
    #[error("failed to read credential `{key}`")]
    StoreRead {
        key: String,
        #[source]
        source: StoreError,
    },
    #[error("failed to persist credential `{key}`")]
    StoreWrite {
        key: String,
        #[source]
        source: StoreError,
    },
    #[error("refresh token rejected; reauthorization required")]
    RefreshTokenRejected,
    #[error("api auth rejected; client credentials cleared")]
    ApiAuthRejected,
    #[error("error talking to esi: {status}")]
    Upstream { status: StatusCode },
    #[error("response body could not be decoded")]
    Decode(#[from] serde_json::Error),
    #[error("request still unresolved after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
    #[error("operation cancelled")]
    Cancelled,
}

impl EsiError {
    pub fn store_read(key: impl Into<String>, source: StoreError) -> Self {
        Self::StoreRead {
            key: key.into(),
            source,
        }
    }

    pub fn store_write(key: impl Into<String>, source: StoreError) -> Self {
        Self::StoreWrite {
            key: key.into(),
            source,
        }
    }

    /// True when the token endpoint refused the stored credentials and they
    /// must be re-provisioned before any further refresh can succeed.
    pub fn is_auth_rejected(&self) -> bool {
        matches!(self, Self::RefreshTokenRejected | Self::ApiAuthRejected)
    }

    /// True for a store read that failed only because the key is missing or
    /// has expired.
    pub fn is_absent_credential(&self) -> bool {
        matches!(self, Self::StoreRead { source, .. } if source.is_absent())
    }

    pub fn display_chain(&self) -> DisplayChainedError<'_> {
        DisplayChainedError { inner: self }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no value stored under `{key}`")]
    Missing { key: String },
    #[error("value under `{key}` has expired")]
    Expired { key: String },
    #[error("keyring operation failed")]
    Keyring(#[from] keyring::Error),
    #[error("stored value serialization failed")]
    Serialization(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn missing(key: impl Into<String>) -> Self {
        Self::Missing { key: key.into() }
    }

    pub fn expired(key: impl Into<String>) -> Self {
        Self::Expired { key: key.into() }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Missing { .. } | Self::Expired { .. })
    }
}

pub struct DisplayChainedError<'a> {
    inner: &'a (dyn std::error::Error + 'static),
}

impl fmt::Debug for DisplayChainedError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(self.inner);

        while let Some(err) = current {
            if first {
                first = false;
            } else {
                write!(f, " -> ")?;
            }

            write!(f, "{err}")?;
            current = err.source();
        }

        Ok(())
    }
}

impl fmt::Display for DisplayChainedError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::{
    Method, Request, StatusCode,
    header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue, USER_AGENT},
};
use tokio_util::sync::CancellationToken;

use super::types::{CredentialStatus, RefreshRequest, TokenResponse};
use crate::{
    EsiError, EsiResult,
    config::EsiConfig,
    store::CredentialStore,
    transport::{
        HttpTransport, RetryingTransport, header_value, read_body, sensitive_header_value,
    },
};

/// Reads credentials from the store and performs the refresh-token grant.
///
/// Holds no credential state of its own; every call goes to the store.
pub struct TokenManager<S, H = RetryingTransport>
where
    S: CredentialStore,
    H: HttpTransport,
{
    config: EsiConfig,
    store: S,
    transport: H,
    cancel: CancellationToken,
}

impl<S> TokenManager<S, RetryingTransport>
where
    S: CredentialStore,
{
    pub fn new(config: EsiConfig, store: S) -> EsiResult<Self> {
        config.validate()?;
        let transport = RetryingTransport::new(&config)?;
        Self::with_transport(config, store, transport)
    }
}

impl<S, H> TokenManager<S, H>
where
    S: CredentialStore,
    H: HttpTransport,
{
    pub fn with_transport(config: EsiConfig, store: S, transport: H) -> EsiResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            transport,
            cancel: CancellationToken::new(),
        })
    }

    /// Aborts in-flight and future requests once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &EsiConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub(crate) fn transport(&self) -> &H {
        &self.transport
    }

    pub(crate) fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn access_token(&self) -> EsiResult<String> {
        self.read(&self.config.keys.access_token)
    }

    pub fn refresh_token(&self) -> EsiResult<String> {
        self.read(&self.config.keys.refresh_token)
    }

    pub fn api_auth(&self) -> EsiResult<String> {
        self.read(&self.config.keys.api_auth)
    }

    /// Stores the Basic credential for the token endpoint, encoded from the
    /// application's client id and secret.
    pub fn provision_api_auth(&self, client_id: &str, client_secret: &str) -> EsiResult<()> {
        let encoded = STANDARD.encode(format!("{client_id}:{client_secret}"));
        self.write(&self.config.keys.api_auth, &encoded, None)
    }

    pub fn provision_refresh_token(&self, refresh_token: &str) -> EsiResult<()> {
        self.write(&self.config.keys.refresh_token, refresh_token, None)
    }

    /// Removes every stored credential.
    pub fn clear(&self) -> EsiResult<()> {
        let keys = &self.config.keys;
        for key in [&keys.access_token, &keys.refresh_token, &keys.api_auth] {
            self.store
                .delete(key)
                .map_err(|source| EsiError::store_write(key.as_str(), source))?;
        }
        log::debug!("cleared stored esi credentials");
        Ok(())
    }

    pub fn credential_status(&self) -> EsiResult<CredentialStatus> {
        Ok(CredentialStatus {
            access_token: readable(self.access_token())?,
            refresh_token: readable(self.refresh_token())?,
            api_auth: readable(self.api_auth())?,
        })
    }

    /// Exchanges the stored refresh token for a new access token and
    /// persists both halves of the returned pair.
    pub async fn refresh_auth(&self) -> EsiResult<()> {
        let refresh_token = self.refresh_token()?;
        let api_auth = self.api_auth()?;
        let request = self.refresh_request(&refresh_token, &api_auth)?;

        log::debug!("refreshing esi access token");
        let response = self.transport.send(request, &self.cancel).await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::BAD_REQUEST => {
                log::warn!("token endpoint rejected the refresh token");
                return Err(EsiError::RefreshTokenRejected);
            }
            StatusCode::UNAUTHORIZED => {
                log::warn!("token endpoint rejected the api auth; clearing it");
                if let Err(err) = self.store.delete(&self.config.keys.api_auth) {
                    let err = EsiError::store_write(self.config.keys.api_auth.as_str(), err);
                    log::warn!("{}", err.display_chain());
                }
                return Err(EsiError::ApiAuthRejected);
            }
            status => return Err(EsiError::Upstream { status }),
        }

        let body = read_body(response, &self.cancel).await?;
        let tokens: TokenResponse = serde_json::from_slice(&body)?;

        self.write(
            &self.config.keys.access_token,
            &tokens.access_token,
            Some(Duration::from_secs(tokens.expires_in)),
        )?;
        self.write(&self.config.keys.refresh_token, &tokens.refresh_token, None)?;

        log::debug!(
            "stored refreshed access token (expires in {}s)",
            tokens.expires_in
        );
        Ok(())
    }

    fn refresh_request(&self, refresh_token: &str, api_auth: &str) -> EsiResult<Request> {
        let body = serde_json::to_vec(&RefreshRequest::new(refresh_token))?;

        let mut request = Request::new(Method::POST, self.config.token_url()?);
        let headers = request.headers_mut();
        headers.insert(USER_AGENT, header_value(&self.config.user_agent)?);
        headers.insert(
            AUTHORIZATION,
            sensitive_header_value(&format!("Basic {api_auth}"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        *request.body_mut() = Some(body.into());
        Ok(request)
    }

    fn read(&self, key: &str) -> EsiResult<String> {
        self.store
            .get(key)
            .map_err(|source| EsiError::store_read(key, source))
    }

    fn write(&self, key: &str, value: &str, ttl: Option<Duration>) -> EsiResult<()> {
        self.store
            .set(key, value, ttl)
            .map_err(|source| EsiError::store_write(key, source))
    }
}

fn readable(read: EsiResult<String>) -> EsiResult<bool> {
    match read {
        Ok(_) => Ok(true),
        Err(err) if err.is_absent_credential() => Ok(false),
        Err(err) => Err(err),
    }
}

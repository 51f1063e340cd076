use reqwest::{
    Method, Request, StatusCode, Url,
    header::{AUTHORIZATION, USER_AGENT},
};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::{
    EsiError, EsiResult,
    auth::TokenManager,
    config::EsiConfig,
    store::CredentialStore,
    transport::{
        HttpTransport, RetryingTransport, header_value, read_body, sensitive_header_value,
    },
};

/// Progress of a single fetch. `Refreshing` always calls the token
/// endpoint; a successful refresh then spends one unit of the attempt
/// budget, whether or not a resource request was made in between.
enum FetchState<T> {
    NeedToken,
    HaveToken(Option<String>),
    Refreshing,
    Done(Option<T>),
    Failed(EsiError),
}

/// Issues GET requests against ESI, attaching and refreshing the bearer
/// token as needed.
pub struct Fetcher<S, H = RetryingTransport>
where
    S: CredentialStore,
    H: HttpTransport,
{
    tokens: TokenManager<S, H>,
}

impl<S> Fetcher<S, RetryingTransport>
where
    S: CredentialStore,
{
    pub fn new(config: EsiConfig, store: S) -> EsiResult<Self> {
        Ok(Self::from_tokens(TokenManager::new(config, store)?))
    }
}

impl<S, H> Fetcher<S, H>
where
    S: CredentialStore,
    H: HttpTransport,
{
    pub fn with_transport(config: EsiConfig, store: S, transport: H) -> EsiResult<Self> {
        Ok(Self::from_tokens(TokenManager::with_transport(
            config, store, transport,
        )?))
    }

    pub fn from_tokens(tokens: TokenManager<S, H>) -> Self {
        Self { tokens }
    }

    pub fn with_cancellation(self, cancel: CancellationToken) -> Self {
        Self::from_tokens(self.tokens.with_cancellation(cancel))
    }

    pub fn tokens(&self) -> &TokenManager<S, H> {
        &self.tokens
    }

    /// Fetches `url` and decodes the JSON body.
    ///
    /// Returns `Ok(None)` when ESI answers 404. With `requires_auth` set, a
    /// missing or expired access token and a 403 from ESI both trigger a
    /// token refresh and another attempt, within the configured budget.
    pub async fn fetch<T>(&self, requires_auth: bool, url: &str) -> EsiResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let url = Url::parse(url)
            .map_err(|err| EsiError::MalformedRequest(format!("{url}: {err}")))?;
        let max_attempts = self.tokens.config().max_attempts;
        let mut attempt = 1;
        let mut state = if requires_auth {
            FetchState::NeedToken
        } else {
            FetchState::HaveToken(None)
        };

        loop {
            state = match state {
                FetchState::NeedToken => match self.tokens.access_token() {
                    Ok(token) => FetchState::HaveToken(Some(token)),
                    Err(err) if err.is_absent_credential() => {
                        log::debug!("no usable access token: {}", err.display_chain());
                        FetchState::Refreshing
                    }
                    Err(err) => FetchState::Failed(err),
                },
                FetchState::HaveToken(token) => self
                    .request(&url, token.as_deref())
                    .await
                    .unwrap_or_else(FetchState::Failed),
                FetchState::Refreshing => match self.tokens.refresh_auth().await {
                    Ok(()) if attempt >= max_attempts => {
                        log::debug!("GET {url}: no attempts left after {attempt}");
                        FetchState::Failed(EsiError::RetriesExhausted { attempts: attempt })
                    }
                    Ok(()) => {
                        attempt += 1;
                        FetchState::NeedToken
                    }
                    Err(err) => FetchState::Failed(err),
                },
                FetchState::Done(value) => return Ok(value),
                FetchState::Failed(err) => return Err(err),
            };
        }
    }

    /// Destination-style variant of [`Fetcher::fetch`]: `destination` is
    /// overwritten on 200 and left untouched on 404.
    pub async fn fetch_into<T>(
        &self,
        requires_auth: bool,
        url: &str,
        destination: &mut T,
    ) -> EsiResult<()>
    where
        T: DeserializeOwned,
    {
        if let Some(value) = self.fetch(requires_auth, url).await? {
            *destination = value;
        }
        Ok(())
    }

    async fn request<T>(&self, url: &Url, bearer: Option<&str>) -> EsiResult<FetchState<T>>
    where
        T: DeserializeOwned,
    {
        let mut request = Request::new(Method::GET, url.clone());
        let headers = request.headers_mut();
        headers.insert(USER_AGENT, header_value(&self.tokens.config().user_agent)?);
        if let Some(token) = bearer {
            headers.insert(
                AUTHORIZATION,
                sensitive_header_value(&format!("Bearer {token}"))?,
            );
        }

        let cancel = self.tokens.cancellation();
        let response = self.tokens.transport().send(request, cancel).await?;
        let status = response.status();
        log::trace!("GET {url} -> {status}");

        match status {
            StatusCode::OK => {
                let body = read_body(response, cancel).await?;
                Ok(FetchState::Done(Some(serde_json::from_slice(&body)?)))
            }
            StatusCode::NOT_FOUND => Ok(FetchState::Done(None)),
            StatusCode::FORBIDDEN if bearer.is_some() => {
                log::debug!("GET {url} rejected the access token");
                Ok(FetchState::Refreshing)
            }
            status => Err(EsiError::Upstream { status }),
        }
    }
}

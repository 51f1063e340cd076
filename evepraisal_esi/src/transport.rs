use std::{
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use rand::{Rng, SeedableRng, rngs::SmallRng};
use reqwest::{Client, Request, Response, StatusCode, header::HeaderValue};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{
    EsiError, EsiResult,
    config::{EsiConfig, RetryPolicy},
};

/// Sends a single logical request, retrying transport-level failures
/// according to its own policy. Status codes other than the retryable ones
/// are handed back untouched for the caller to interpret.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: Request, cancel: &CancellationToken) -> EsiResult<Response>;
}

pub struct RetryingTransport {
    client: Client,
    policy: RetryPolicy,
    rng: Mutex<SmallRng>,
}

impl RetryingTransport {
    pub fn new(config: &EsiConfig) -> EsiResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_client(builder.build()?, config.retry.clone()))
    }

    pub fn with_client(client: Client, policy: RetryPolicy) -> Self {
        Self {
            client,
            policy,
            rng: Mutex::new(SmallRng::from_entropy()),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn next_backoff(&self, failed_attempts: u32) -> Duration {
        let base = exponential_backoff(
            failed_attempts,
            self.policy.initial_backoff,
            self.policy.max_backoff,
        );
        let jitter_factor = self.policy.jitter_factor.clamp(0.0, 1.0) as f64;
        if jitter_factor <= 0.0 || base.is_zero() {
            return base;
        }

        let multiplier = self
            .rng()
            .gen_range((1.0 - jitter_factor)..=(1.0 + jitter_factor));
        base.mul_f64(multiplier)
    }

    fn rng(&self) -> MutexGuard<'_, SmallRng> {
        match self.rng.lock() {
            Ok(rng) => rng,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl HttpTransport for RetryingTransport {
    async fn send(&self, mut request: Request, cancel: &CancellationToken) -> EsiResult<Response> {
        let max_attempts = self.policy.max_attempts.max(1);
        let method = request.method().clone();
        let url = request.url().clone();
        let mut attempt = 1;

        loop {
            // Streaming bodies cannot be cloned; those get a single attempt.
            let retry_request = if attempt < max_attempts {
                request.try_clone()
            } else {
                None
            };

            log::trace!("{method} {url} (attempt {attempt}/{max_attempts})");
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(EsiError::Cancelled),
                outcome = self.client.execute(request) => outcome,
            };

            let Some(next_request) = retry_request else {
                return Ok(outcome?);
            };

            match outcome {
                Ok(response) if !is_retryable_status(response.status()) => return Ok(response),
                Ok(response) => {
                    log::warn!(
                        "{method} {url} returned {} (attempt {attempt}/{max_attempts}), retrying",
                        response.status()
                    );
                }
                Err(err) if !is_retryable_error(&err) => return Err(err.into()),
                Err(err) => {
                    log::warn!(
                        "{method} {url} failed (attempt {attempt}/{max_attempts}), retrying: {err}"
                    );
                }
            }

            let wait = self.next_backoff(attempt);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(EsiError::Cancelled),
                _ = sleep(wait) => {}
            }

            request = next_request;
            attempt += 1;
        }
    }
}

/// Reads a response body, aborting if `cancel` fires first.
pub(crate) async fn read_body(
    response: Response,
    cancel: &CancellationToken,
) -> EsiResult<Vec<u8>> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(EsiError::Cancelled),
        body = response.bytes() => Ok(body?.to_vec()),
    }
}

pub(crate) fn header_value(value: &str) -> EsiResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| EsiError::MalformedRequest("header value contains invalid characters".into()))
}

/// Like [`header_value`], but marked so it is redacted from debug output.
pub(crate) fn sensitive_header_value(value: &str) -> EsiResult<HeaderValue> {
    let mut value = header_value(value)?;
    value.set_sensitive(true);
    Ok(value)
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout() || err.is_request()
}

fn exponential_backoff(attempts: u32, initial: Duration, max: Duration) -> Duration {
    let exponent = attempts.saturating_sub(1).min(31);
    let factor = 1_u128 << exponent;
    let initial_ms = initial.as_millis();
    let max_ms = max.as_millis();
    let backoff_ms = initial_ms.saturating_mul(factor).min(max_ms);
    Duration::from_millis(backoff_ms as u64)
}

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{
    Method, Request, Response,
    header::{HeaderMap, HeaderName},
};
use tokio_util::sync::CancellationToken;

use crate::{
    EsiError, EsiResult, StoreError, clock::Clock, store::CredentialStore,
    transport::HttpTransport,
};

#[derive(Clone)]
pub(crate) struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn at(epoch_secs: i64) -> Self {
        Self {
            now: Arc::new(Mutex::new(
                DateTime::from_timestamp(epoch_secs, 0).expect("valid epoch seconds"),
            )),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock");
        *now += chrono::Duration::from_std(by).expect("duration fits");
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}

#[derive(Clone, Debug)]
pub(crate) struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl RecordedRequest {
    pub fn header(&self, name: HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn json_body(&self) -> serde_json::Value {
        let body = self.body.as_deref().expect("request has a body");
        serde_json::from_slice(body).expect("request body is json")
    }
}

/// Answers requests from a fixed queue of `(status, body)` pairs and
/// records everything it was asked to send.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    responses: Mutex<VecDeque<(u16, String)>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<(u16, String)>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn requests_to(&self, url: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.url == url)
            .count()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: Request, cancel: &CancellationToken) -> EsiResult<Response> {
        if cancel.is_cancelled() {
            return Err(EsiError::Cancelled);
        }

        self.requests
            .lock()
            .expect("requests lock")
            .push(RecordedRequest {
                method: request.method().clone(),
                url: request.url().to_string(),
                headers: request.headers().clone(),
                body: request
                    .body()
                    .and_then(|body| body.as_bytes())
                    .map(<[u8]>::to_vec),
            });

        let (status, body) = self
            .responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected request to {}", request.url()));

        let response = http::Response::builder()
            .status(status)
            .body(body)
            .expect("valid scripted response");
        Ok(Response::from(response))
    }
}

/// Store whose reads come from a fixed map and whose writes always fail.
pub(crate) struct FailingStore {
    values: Option<HashMap<String, String>>,
}

impl FailingStore {
    pub fn with_values(values: &[(&str, &str)]) -> Self {
        Self {
            values: Some(
                values
                    .iter()
                    .map(|(key, value)| (key.to_string(), value.to_string()))
                    .collect(),
            ),
        }
    }

    pub fn unavailable() -> Self {
        Self { values: None }
    }
}

impl CredentialStore for FailingStore {
    fn get(&self, key: &str) -> Result<String, StoreError> {
        match &self.values {
            None => Err(StoreError::Unavailable("connection refused".to_string())),
            Some(values) => values
                .get(key)
                .cloned()
                .ok_or_else(|| StoreError::missing(key)),
        }
    }

    fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("read-only replica".to_string()))
    }

    fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("read-only replica".to_string()))
    }
}

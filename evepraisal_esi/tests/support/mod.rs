#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{DateTime, Utc};
use evepraisal_esi::{
    Clock, CredentialStore, EsiConfig, Fetcher, MemoryCredentialStore, RetryPolicy, TokenManager,
};
use mockito::ServerGuard;

pub const MARKET_PATH: &str = "/latest/markets/10000002/orders/";
pub const TOKEN_PATH: &str = "/oauth/token";
pub const API_AUTH: &str = "Y2xpZW50OnNlY3JldA==";

pub type SharedStore = Arc<MemoryCredentialStore<ManualClock>>;

#[derive(Clone)]
pub struct ManualClock {
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

pub struct TestHarness {
    pub server: ServerGuard,
    pub clock: ManualClock,
    pub store: SharedStore,
}

impl TestHarness {
    pub async fn new() -> Self {
        init_logging();
        let clock = ManualClock::at(1_700_000_000);
        Self {
            server: mockito::Server::new_async().await,
            store: Arc::new(MemoryCredentialStore::with_clock(clock.clone())),
            clock,
        }
    }

    pub fn config(&self) -> EsiConfig {
        EsiConfig {
            token_url: self.url(TOKEN_PATH),
            retry: RetryPolicy::none(),
            request_timeout: Some(Duration::from_secs(5)),
            ..EsiConfig::default()
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.server.url())
    }

    pub fn fetcher(&self) -> Fetcher<SharedStore> {
        Fetcher::new(self.config(), Arc::clone(&self.store)).expect("fetcher")
    }

    pub fn tokens(&self) -> TokenManager<SharedStore> {
        TokenManager::new(self.config(), Arc::clone(&self.store)).expect("token manager")
    }

    pub fn seed_refresh_credentials(&self) {
        self.store
            .set("evepraisal_refresh", "refresh-1", None)
            .expect("seed refresh");
        self.store
            .set("evepraisal_apiauth", API_AUTH, None)
            .expect("seed api auth");
    }

    pub fn seed_access_token(&self, token: &str) {
        self.store
            .set("evepraisal_access", token, Some(Duration::from_secs(1200)))
            .expect("seed access");
    }
}

pub fn init_logging() {
    let _ = pretty_env_logger::formatted_builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Trace)
        .try_init();
}

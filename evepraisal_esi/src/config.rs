use std::time::Duration;

use reqwest::Url;

use crate::{EsiError, EsiResult};

pub const DEFAULT_USER_AGENT: &str = "pubkraal/go-evepraisal";
pub const DEFAULT_TOKEN_URL: &str = "https://login.eveonline.com/oauth/token";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Store keys for the three credential entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialKeys {
    pub access_token: String,
    pub refresh_token: String,
    pub api_auth: String,
}

impl Default for CredentialKeys {
    fn default() -> Self {
        Self {
            access_token: "evepraisal_access".to_string(),
            refresh_token: "evepraisal_refresh".to_string(),
            api_auth: "evepraisal_apiauth".to_string(),
        }
    }
}

/// Transport-level retry policy, applied to every outbound request before
/// the fetcher ever sees a response.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_factor: f32,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter_factor: 0.0,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            jitter_factor: 0.2,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EsiConfig {
    pub user_agent: String,
    pub token_url: String,
    pub keys: CredentialKeys,
    /// Attempt budget for a single fetch, shared between token refreshes
    /// and resource calls.
    pub max_attempts: u32,
    pub request_timeout: Option<Duration>,
    pub retry: RetryPolicy,
}

impl Default for EsiConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            keys: CredentialKeys::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            request_timeout: Some(Duration::from_secs(30)),
            retry: RetryPolicy::default(),
        }
    }
}

impl EsiConfig {
    pub fn validate(&self) -> EsiResult<()> {
        if self.user_agent.trim().is_empty() {
            return Err(EsiError::InvalidConfig("user_agent must be set"));
        }
        if self.token_url()?.cannot_be_a_base() {
            return Err(EsiError::InvalidConfig("token_url must be an absolute url"));
        }
        let keys = [
            &self.keys.access_token,
            &self.keys.refresh_token,
            &self.keys.api_auth,
        ];
        if keys.iter().any(|key| key.trim().is_empty()) {
            return Err(EsiError::InvalidConfig("credential keys must not be empty"));
        }
        if keys[0] == keys[1] || keys[0] == keys[2] || keys[1] == keys[2] {
            return Err(EsiError::InvalidConfig("credential keys must be distinct"));
        }
        if self.max_attempts == 0 {
            return Err(EsiError::InvalidConfig("max_attempts must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(EsiError::InvalidConfig(
                "retry.max_attempts must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn token_url(&self) -> EsiResult<Url> {
        Url::parse(&self.token_url).map_err(|_| EsiError::InvalidConfig("token_url is not a url"))
    }
}

#[cfg(test)]
mod tests {
    use super::EsiConfig;
    use crate::EsiError;

    #[test]
    fn default_config_is_valid() {
        EsiConfig::default()
            .validate()
            .expect("default config should validate");
    }

    #[test]
    fn empty_user_agent_is_rejected() {
        let config = EsiConfig {
            user_agent: "  ".to_string(),
            ..EsiConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EsiError::InvalidConfig("user_agent must be set"))
        ));
    }

    #[test]
    fn relative_token_url_is_rejected() {
        let config = EsiConfig {
            token_url: "/oauth/token".to_string(),
            ..EsiConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let mut config = EsiConfig::default();
        config.keys.refresh_token = config.keys.access_token.clone();
        assert!(matches!(
            config.validate(),
            Err(EsiError::InvalidConfig("credential keys must be distinct"))
        ));
    }

    #[test]
    fn zero_attempt_budget_is_rejected() {
        let config = EsiConfig {
            max_attempts: 0,
            ..EsiConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

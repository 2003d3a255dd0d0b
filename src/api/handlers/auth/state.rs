//! Auth state and configuration.

use anyhow::anyhow;
use secrecy::{ExposeSecret, SecretBox, SecretString};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::guard::AbuseGuard;
use super::storage::AccountStore;
use crate::envelope::KEY_LEN;

const DEFAULT_TOKEN_TTL_MINUTES: i64 = 24 * 60;
const DEFAULT_REMEMBER_ME_TTL_MINUTES: i64 = 7 * 24 * 60;
const DEFAULT_REFRESH_THRESHOLD_HOURS: i64 = 4;

/// Deployment environment. Key distribution only exists outside production.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            other => Err(anyhow!("unknown environment: {other}")),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug)]
pub struct AuthConfig {
    environment: Environment,
    envelope_key: SecretBox<[u8; KEY_LEN]>,
    token_secret: SecretString,
    frontend_url: String,
    token_ttl_minutes: i64,
    remember_me_ttl_minutes: i64,
    refresh_threshold_hours: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(
        environment: Environment,
        envelope_key: SecretBox<[u8; KEY_LEN]>,
        token_secret: SecretString,
        frontend_url: String,
    ) -> Self {
        Self {
            environment,
            envelope_key,
            token_secret,
            frontend_url,
            token_ttl_minutes: DEFAULT_TOKEN_TTL_MINUTES,
            remember_me_ttl_minutes: DEFAULT_REMEMBER_ME_TTL_MINUTES,
            refresh_threshold_hours: DEFAULT_REFRESH_THRESHOLD_HOURS,
        }
    }

    #[must_use]
    pub fn with_token_ttl_minutes(mut self, minutes: i64) -> Self {
        self.token_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_remember_me_ttl_minutes(mut self, minutes: i64) -> Self {
        self.remember_me_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_refresh_threshold_hours(mut self, hours: i64) -> Self {
        self.refresh_threshold_hours = hours;
        self
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    #[must_use]
    pub fn envelope_key(&self) -> &[u8; KEY_LEN] {
        self.envelope_key.expose_secret()
    }

    pub(crate) fn signing_secret(&self) -> &[u8] {
        self.token_secret.expose_secret().as_bytes()
    }

    #[must_use]
    pub fn frontend_url(&self) -> &str {
        &self.frontend_url
    }

    #[must_use]
    pub fn token_ttl_minutes(&self) -> i64 {
        self.token_ttl_minutes
    }

    #[must_use]
    pub fn remember_me_ttl_minutes(&self) -> i64 {
        self.remember_me_ttl_minutes
    }

    #[must_use]
    pub fn refresh_threshold_hours(&self) -> i64 {
        self.refresh_threshold_hours
    }
}

/// Long-lived service state shared by every request handler.
///
/// The abuse guard lives here for the lifetime of the process; its tables
/// are process-local, so a multi-instance deployment needs a shared store
/// for the counters to stay correct across instances.
pub struct AuthState {
    config: AuthConfig,
    guard: AbuseGuard,
    accounts: Arc<dyn AccountStore>,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, accounts: Arc<dyn AccountStore>) -> Self {
        Self {
            config,
            guard: AbuseGuard::default(),
            accounts,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn guard(&self) -> &AbuseGuard {
        &self.guard
    }

    pub(crate) fn accounts(&self) -> &dyn AccountStore {
        self.accounts.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::storage::MemoryAccountStore;

    fn config() -> AuthConfig {
        AuthConfig::new(
            Environment::Development,
            SecretBox::new(Box::new([7u8; KEY_LEN])),
            SecretString::from("signing-secret"),
            "http://localhost:3000".to_string(),
        )
    }

    #[test]
    fn config_defaults_and_overrides() {
        let config = config();
        assert_eq!(config.environment(), Environment::Development);
        assert_eq!(config.token_ttl_minutes(), DEFAULT_TOKEN_TTL_MINUTES);
        assert_eq!(
            config.remember_me_ttl_minutes(),
            DEFAULT_REMEMBER_ME_TTL_MINUTES
        );
        assert_eq!(
            config.refresh_threshold_hours(),
            DEFAULT_REFRESH_THRESHOLD_HOURS
        );

        let config = config
            .with_token_ttl_minutes(30)
            .with_remember_me_ttl_minutes(60)
            .with_refresh_threshold_hours(1);
        assert_eq!(config.token_ttl_minutes(), 30);
        assert_eq!(config.remember_me_ttl_minutes(), 60);
        assert_eq!(config.refresh_threshold_hours(), 1);
    }

    #[test]
    fn environment_parses_and_rejects() {
        assert_eq!(
            "development".parse::<Environment>().unwrap(),
            Environment::Development
        );
        assert_eq!(
            " Production ".parse::<Environment>().unwrap(),
            Environment::Production
        );
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn state_exposes_key_and_secret() {
        let state = AuthState::new(config(), Arc::new(MemoryAccountStore::default()));
        assert_eq!(state.config().envelope_key(), &[7u8; KEY_LEN]);
        assert_eq!(state.config().signing_secret(), b"signing-secret");
    }
}

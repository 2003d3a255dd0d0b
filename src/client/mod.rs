//! Client-side session handling.
//!
//! [`SessionClient`] mirrors what the web frontend does: fetch the shared
//! envelope key, seal credentials before they leave the process, hold the
//! issued token, and keep it fresh via the [`watchdog`] loop.

use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretBox};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::api::handlers::auth::types::{
    AccountSummary, KeyResponse, LoginResponse, TokenResponse,
};
use crate::api::APP_USER_AGENT;
use crate::envelope::{self, KEY_LEN};

pub mod watchdog;

/// Seconds between accepted activity updates. Anything more frequent is
/// dropped so a busy UI does not hammer the session lock.
const ACTIVITY_THROTTLE_SECONDS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    SignedOut,
    Active,
    Expired,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("received an unusable envelope key")]
    Key,
    #[error("failed to seal credentials")]
    Seal,
    #[error("not signed in")]
    SignedOut,
    #[error("server rejected the request: {status} {message}")]
    Rejected {
        status: StatusCode,
        message: String,
        retry_after_seconds: Option<u64>,
    },
}

struct SessionInner {
    key: Option<SecretBox<[u8; KEY_LEN]>>,
    token: Option<String>,
    account: Option<AccountSummary>,
    last_activity: DateTime<Utc>,
    phase: SessionPhase,
}

/// One authenticated session against the credential-exchange API.
pub struct SessionClient {
    http: Client,
    base_url: String,
    inner: Mutex<SessionInner>,
    refresh_in_flight: AtomicBool,
}

impl SessionClient {
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = Client::builder().user_agent(APP_USER_AGENT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            inner: Mutex::new(SessionInner {
                key: None,
                token: None,
                account: None,
                last_activity: Utc::now(),
                phase: SessionPhase::SignedOut,
            }),
            refresh_in_flight: AtomicBool::new(false),
        })
    }

    /// Log in with sealed credentials; on success the session turns active.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] with the server's status and body
    /// when the credentials are refused, locked out, or malformed.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<AccountSummary, ClientError> {
        let key = self.envelope_key().await?;
        let payload = serde_json::json!({
            "email": email,
            "password": password,
            "rememberMe": remember_me,
        });
        let sealed =
            envelope::seal(&key, payload.to_string().as_bytes()).map_err(|_| ClientError::Seal)?;

        let response = self
            .http
            .post(self.url("/user/login"))
            .json(&sealed)
            .send()
            .await?;
        let body: LoginResponse = Self::check(response).await?.json().await?;

        let mut inner = self.lock();
        inner.token = Some(body.token);
        inner.account = Some(body.account.clone());
        inner.phase = SessionPhase::Active;
        inner.last_activity = Utc::now();
        Ok(body.account)
    }

    /// Register a new account with sealed credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] on conflict, throttle, or
    /// validation failure.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Option<&str>,
    ) -> Result<AccountSummary, ClientError> {
        let key = self.envelope_key().await?;
        let payload = serde_json::json!({
            "name": name,
            "email": email,
            "password": password,
            "role": role,
        });
        let sealed =
            envelope::seal(&key, payload.to_string().as_bytes()).map_err(|_| ClientError::Seal)?;

        let response = self
            .http
            .post(self.url("/user/register"))
            .json(&sealed)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Exchange the current token for a fresh one.
    ///
    /// Concurrent calls collapse into one request; the extras return
    /// immediately without touching the server.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SignedOut`] without a token, otherwise the
    /// server's verdict.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        if self
            .refresh_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("refresh already in flight");
            return Ok(());
        }
        let result = self.refresh_inner().await;
        self.refresh_in_flight.store(false, Ordering::SeqCst);
        result
    }

    async fn refresh_inner(&self) -> Result<(), ClientError> {
        let token = self.lock().token.clone().ok_or(ClientError::SignedOut)?;
        let response = self
            .http
            .post(self.url("/user/refresh-token"))
            .bearer_auth(&token)
            .send()
            .await?;
        let body: TokenResponse = Self::check(response).await?.json().await?;

        let mut inner = self.lock();
        inner.token = Some(body.token);
        inner.phase = SessionPhase::Active;
        Ok(())
    }

    /// Drop all session material. The server keeps no session state, so
    /// this is the whole logout.
    pub fn logout(&self) {
        let mut inner = self.lock();
        inner.key = None;
        inner.token = None;
        inner.account = None;
        inner.phase = SessionPhase::SignedOut;
    }

    /// Like [`logout`](Self::logout), but marks the session as expired so
    /// the UI can tell "you signed out" from "your session ran out".
    pub fn expire(&self) {
        let mut inner = self.lock();
        inner.key = None;
        inner.token = None;
        inner.account = None;
        inner.phase = SessionPhase::Expired;
    }

    /// Note user activity, at most once per throttle interval.
    pub fn record_activity(&self) {
        self.record_activity_at(Utc::now());
    }

    fn record_activity_at(&self, now: DateTime<Utc>) {
        let mut inner = self.lock();
        if (now - inner.last_activity).num_seconds() >= ACTIVITY_THROTTLE_SECONDS {
            inner.last_activity = now;
        }
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    #[must_use]
    pub fn account(&self) -> Option<AccountSummary> {
        self.lock().account.clone()
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.lock().phase
    }

    #[must_use]
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.lock().last_activity
    }

    /// Return the cached envelope key, fetching it once from the server.
    async fn envelope_key(&self) -> Result<[u8; KEY_LEN], ClientError> {
        if let Some(key) = self.lock().key.as_ref() {
            return Ok(*key.expose_secret());
        }

        let response = self.http.get(self.url("/crypto/key")).send().await?;
        let body: KeyResponse = Self::check(response).await?.json().await?;
        let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, body.key)
            .map_err(|_| ClientError::Key)?;
        let key: [u8; KEY_LEN] = decoded.try_into().map_err(|_| ClientError::Key)?;

        self.lock().key = Some(SecretBox::new(Box::new(key)));
        Ok(key)
    }

    async fn check(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let retry_after_seconds = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok());
        let message = response.text().await.unwrap_or_default();
        Err(ClientError::Rejected {
            status,
            message,
            retry_after_seconds,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn activity_updates_are_throttled() {
        let client = SessionClient::new("http://localhost:8080").unwrap();
        let start = client.last_activity();

        // Too soon: dropped.
        client.record_activity_at(start + Duration::seconds(ACTIVITY_THROTTLE_SECONDS - 1));
        assert_eq!(client.last_activity(), start);

        // Past the throttle: accepted.
        let later = start + Duration::seconds(ACTIVITY_THROTTLE_SECONDS);
        client.record_activity_at(later);
        assert_eq!(client.last_activity(), later);
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = SessionClient::new("http://localhost:8080/").unwrap();
        assert_eq!(client.url("/user/login"), "http://localhost:8080/user/login");
    }

    #[test]
    fn fresh_session_is_signed_out() {
        let client = SessionClient::new("http://localhost:8080").unwrap();
        assert_eq!(client.phase(), SessionPhase::SignedOut);
        assert!(client.token().is_none());
        assert!(client.account().is_none());
    }

    #[test]
    fn expire_and_logout_differ_only_in_phase() {
        let client = SessionClient::new("http://localhost:8080").unwrap();
        client.lock().token = Some("token".to_string());
        client.expire();
        assert_eq!(client.phase(), SessionPhase::Expired);
        assert!(client.token().is_none());

        client.lock().token = Some("token".to_string());
        client.logout();
        assert_eq!(client.phase(), SessionPhase::SignedOut);
        assert!(client.token().is_none());
    }
}

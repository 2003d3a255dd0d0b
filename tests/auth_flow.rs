//! End-to-end flows over a real listener: sealed credentials in, tokens out,
//! lockout and throttle enforced at the HTTP surface.

use reqwest::StatusCode;
use secrecy::{SecretBox, SecretString};
use std::sync::Arc;

use neuromotion_auth::api;
use neuromotion_auth::api::handlers::auth::{
    AuthConfig, AuthState, Environment, MemoryAccountStore,
};
use neuromotion_auth::client::{ClientError, SessionClient, SessionPhase};

async fn serve() -> String {
    let config = AuthConfig::new(
        Environment::Development,
        SecretBox::new(Box::new([9u8; 32])),
        SecretString::from("integration-secret"),
        "http://localhost:3000".to_string(),
    );
    let state = Arc::new(AuthState::new(
        config,
        Arc::new(MemoryAccountStore::default()),
    ));
    let app = api::app(state).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });

    format!("http://{addr}")
}

fn rejection(err: ClientError) -> (StatusCode, Option<u64>) {
    match err {
        ClientError::Rejected {
            status,
            retry_after_seconds,
            ..
        } => (status, retry_after_seconds),
        other => panic!("expected a server rejection, got: {other}"),
    }
}

#[tokio::test]
async fn register_login_refresh_round_trip() {
    let base_url = serve().await;
    let session = SessionClient::new(&base_url).unwrap();

    let account = session
        .register("Alice", "alice@example.com", "tremor2024", None)
        .await
        .unwrap();
    assert_eq!(account.email, "alice@example.com");
    assert_eq!(account.role, "patient");

    let account = session
        .login("alice@example.com", "tremor2024", false)
        .await
        .unwrap();
    assert_eq!(account.email, "alice@example.com");
    assert_eq!(session.phase(), SessionPhase::Active);

    let first_token = session.token().unwrap();
    session.refresh().await.unwrap();
    let second_token = session.token().unwrap();
    assert_ne!(first_token, second_token);
    assert_eq!(session.phase(), SessionPhase::Active);

    session.logout();
    assert_eq!(session.phase(), SessionPhase::SignedOut);
    assert!(session.token().is_none());
}

#[tokio::test]
async fn wrong_password_is_a_generic_unauthorized() {
    let base_url = serve().await;
    let session = SessionClient::new(&base_url).unwrap();

    session
        .register("Alice", "alice@example.com", "tremor2024", None)
        .await
        .unwrap();

    let err = session
        .login("alice@example.com", "wrong-pass1", false)
        .await
        .unwrap_err();
    let (status, _) = rejection(err);
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(session.phase(), SessionPhase::SignedOut);
}

#[tokio::test]
async fn repeated_failures_lock_the_account_out() {
    let base_url = serve().await;
    let session = SessionClient::new(&base_url).unwrap();

    session
        .register("Alice", "alice@example.com", "tremor2024", None)
        .await
        .unwrap();

    for _ in 0..5 {
        let err = session
            .login("alice@example.com", "wrong-pass1", false)
            .await
            .unwrap_err();
        assert_eq!(rejection(err).0, StatusCode::UNAUTHORIZED);
    }

    // Correct credentials no longer help; the response carries Retry-After.
    let err = session
        .login("alice@example.com", "tremor2024", false)
        .await
        .unwrap_err();
    let (status, retry_after) = rejection(err);
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(retry_after.is_some_and(|seconds| seconds > 0));
}

#[tokio::test]
async fn registration_throttle_kicks_in_on_the_fourth_attempt() {
    let base_url = serve().await;
    let session = SessionClient::new(&base_url).unwrap();

    for i in 0..3 {
        session
            .register(
                &format!("User {i}"),
                &format!("user{i}@example.com"),
                "tremor2024",
                None,
            )
            .await
            .unwrap();
    }

    let err = session
        .register("User 3", "user3@example.com", "tremor2024", None)
        .await
        .unwrap_err();
    let (status, retry_after) = rejection(err);
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(retry_after.is_some_and(|seconds| seconds > 0));
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let base_url = serve().await;
    let session = SessionClient::new(&base_url).unwrap();

    session
        .register("Alice", "alice@example.com", "tremor2024", None)
        .await
        .unwrap();
    let err = session
        .register("Alice Again", "Alice@Example.com", "tremor2024", None)
        .await
        .unwrap_err();
    assert_eq!(rejection(err).0, StatusCode::CONFLICT);
}

//! Login endpoint: decode, classify, decrypt, validate, authenticate.

use axum::{extract::Extension, http::HeaderMap, response::IntoResponse, Json};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

use super::credentials::parse_credentials;
use super::error::AuthError;
use super::guard::LoginGate;
use super::state::AuthState;
use super::storage::{self, verify_password};
use super::types::{AccountSummary, LoginRequest, LoginResponse};
use super::utils::{extract_client_ip, normalize_email, valid_email};
use crate::token::{sign_hs256, SessionClaims};

#[utoipa::path(
    post,
    path = "/user/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Malformed or undecryptable request", body = String),
        (status = 401, description = "Invalid credentials", body = String),
        (status = 429, description = "Locked out, includes Retry-After", body = String)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
    payload: Option<Json<Value>>,
) -> Result<impl IntoResponse, AuthError> {
    let Some(Json(body)) = payload else {
        return Err(AuthError::Malformed);
    };

    let request: LoginRequest = parse_credentials(&body, state.config().envelope_key())?;

    let email = normalize_email(&request.email);
    if !valid_email(&email) || request.password.is_empty() {
        return Err(AuthError::Malformed);
    }

    let client_ip = extract_client_ip(&headers).unwrap_or_else(|| "unknown".to_string());
    debug!(
        email = %email,
        role = request.role.as_deref().unwrap_or(""),
        "login attempt from {client_ip}"
    );

    // Lockout check happens before the account store is touched.
    if let LoginGate::Locked {
        retry_after_seconds,
    } = state.guard().check_login(&client_ip, &email)
    {
        return Err(AuthError::Locked {
            retry_after_seconds,
        });
    }

    let account = state.accounts().find_by_email(&email).await?;

    let Some(account) = account else {
        // Burn the same hashing cost as a real verification so a missing
        // account and a wrong password are observably identical.
        let _ = verify_password(&request.password, storage::DUMMY_HASH);
        state.guard().record_login_failure(&client_ip, &email);
        return Err(AuthError::Unauthorized);
    };

    if !verify_password(&request.password, &account.password_hash) {
        state.guard().record_login_failure(&client_ip, &email);
        return Err(AuthError::Unauthorized);
    }

    state.guard().clear_login_failures(&client_ip, &email);

    let ttl_minutes = if request.remember_me {
        state.config().remember_me_ttl_minutes()
    } else {
        state.config().token_ttl_minutes()
    };
    let claims = SessionClaims::new(
        &account.id.to_string(),
        &account.email,
        &account.role,
        ttl_minutes,
    );
    let token = sign_hs256(state.config().signing_secret(), &claims).map_err(|err| {
        error!("Failed to sign session token: {err}");
        AuthError::Internal
    })?;

    Ok(Json(LoginResponse {
        token,
        account: AccountSummary {
            id: account.id.to_string(),
            name: account.name,
            email: account.email,
            role: account.role,
        },
    }))
}

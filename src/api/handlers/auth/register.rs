//! Registration endpoint with the per-IP throttle.

use axum::{extract::Extension, http::HeaderMap, http::StatusCode, response::IntoResponse, Json};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use super::credentials::parse_credentials;
use super::error::AuthError;
use super::guard::RegistrationGate;
use super::state::AuthState;
use super::storage::{hash_password, CreateOutcome, NewAccount};
use super::types::{AccountSummary, RegisterRequest};
use super::utils::{extract_client_ip, normalize_email, valid_email, valid_password};

/// Roles an account may self-register with. Anything else (staff, admin)
/// is provisioned out of band.
const SELF_REGISTER_ROLES: [&str; 2] = ["patient", "clinician"];

#[utoipa::path(
    post,
    path = "/user/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registration successful", body = AccountSummary),
        (status = 400, description = "Malformed or undecryptable request", body = String),
        (status = 409, description = "An account with this email already exists", body = String),
        (status = 429, description = "Rate limited, includes Retry-After", body = String)
    ),
    tag = "auth"
)]
pub async fn register(
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
    payload: Option<Json<Value>>,
) -> Result<impl IntoResponse, AuthError> {
    let Some(Json(body)) = payload else {
        return Err(AuthError::Malformed);
    };

    let request: RegisterRequest = parse_credentials(&body, state.config().envelope_key())?;

    let name = request.name.trim().to_string();
    let email = normalize_email(&request.email);
    if name.is_empty() || !valid_email(&email) {
        return Err(AuthError::Malformed);
    }
    if !valid_password(&request.password) {
        return Err(AuthError::Malformed);
    }
    let role = resolve_role(request.role.as_deref())?;

    let client_ip = extract_client_ip(&headers).unwrap_or_else(|| "unknown".to_string());
    debug!(email = %email, role, "registration attempt from {client_ip}");

    if let RegistrationGate::Limited {
        retry_after_seconds,
    } = state.guard().check_registration(&client_ip)
    {
        return Err(AuthError::RateLimited {
            retry_after_seconds,
        });
    }

    let password_hash = hash_password(&request.password)?;

    // Uniqueness is enforced by the store itself, so two racing requests
    // for the same email cannot both be created.
    let outcome = state
        .accounts()
        .create(NewAccount {
            name,
            email,
            role: role.to_string(),
            password_hash,
        })
        .await?;

    match outcome {
        CreateOutcome::Created(account) => {
            state.guard().record_registration(&client_ip);
            info!(account_id = %account.id, "account created");
            Ok((
                StatusCode::CREATED,
                Json(AccountSummary {
                    id: account.id.to_string(),
                    name: account.name,
                    email: account.email,
                    role: account.role,
                }),
            ))
        }
        CreateOutcome::Conflict => Err(AuthError::Conflict),
    }
}

fn resolve_role(role: Option<&str>) -> Result<&'static str, AuthError> {
    let Some(role) = role.map(str::trim).filter(|role| !role.is_empty()) else {
        return Ok("patient");
    };
    SELF_REGISTER_ROLES
        .iter()
        .find(|allowed| allowed.eq_ignore_ascii_case(role))
        .copied()
        .ok_or(AuthError::Malformed)
}

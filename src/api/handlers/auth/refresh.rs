//! Token refresh endpoint, protected by the current token.

use axum::{extract::Extension, http::HeaderMap, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::{debug, error};

use super::error::AuthError;
use super::state::AuthState;
use super::types::TokenResponse;
use super::utils::bearer_token;
use crate::token::{sign_hs256, verify_hs256, SessionClaims};

#[utoipa::path(
    post,
    path = "/user/refresh-token",
    responses(
        (status = 200, description = "New token issued", body = TokenResponse),
        (status = 401, description = "Missing, invalid, or expired token", body = String)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn refresh_token(
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, AuthError> {
    let Some(token) = bearer_token(&headers) else {
        return Err(AuthError::Unauthorized);
    };

    // Expired tokens cannot be refreshed; the client has to log in again.
    let claims = verify_hs256(state.config().signing_secret(), token).map_err(|err| {
        debug!("refresh rejected: {err}");
        AuthError::Unauthorized
    })?;

    let renewed = SessionClaims::new(
        &claims.sub,
        &claims.email,
        &claims.role,
        state.config().token_ttl_minutes(),
    );
    let token = sign_hs256(state.config().signing_secret(), &renewed).map_err(|err| {
        error!("Failed to sign refreshed token: {err}");
        AuthError::Internal
    })?;

    Ok(Json(TokenResponse { token }))
}

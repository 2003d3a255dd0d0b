//! Key distribution endpoint, development convenience only.
//!
//! The shared AEAD key rides to the client over TLS; this channel has no
//! authentication of its own beyond transport security. In production the
//! endpoint answers with a fixed "not available" body so the response
//! never reflects configuration state.

use axum::{
    extract::Extension,
    http::{header::CACHE_CONTROL, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::sync::Arc;

use super::state::{AuthState, Environment};
use super::types::KeyResponse;

#[utoipa::path(
    get,
    path = "/crypto/key",
    responses(
        (status = 200, description = "Base64 envelope key", body = KeyResponse),
        (status = 404, description = "Key distribution is not available", body = String)
    ),
    tag = "crypto"
)]
pub async fn crypto_key(Extension(state): Extension<Arc<AuthState>>) -> impl IntoResponse {
    if state.config().environment() == Environment::Production {
        return (
            StatusCode::NOT_FOUND,
            "Key distribution is not available".to_string(),
        )
            .into_response();
    }

    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));

    (
        StatusCode::OK,
        headers,
        Json(KeyResponse {
            key: STANDARD.encode(state.config().envelope_key()),
        }),
    )
        .into_response()
}

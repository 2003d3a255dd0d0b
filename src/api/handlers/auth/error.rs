//! Error taxonomy surfaced by the credential-exchange endpoints.
//!
//! Crypto and parsing detail never reaches the caller: decrypt, decode, and
//! deserialize failures all collapse into one generic message, and internal
//! errors are logged server-side with a sanitized body on the wire.

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::error;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Malformed request")]
    Malformed,
    /// Envelope could not be decoded, decrypted, or deserialized. One
    /// message for all of them; the caller must not learn which step failed.
    #[error("Cannot process request")]
    Authentication,
    #[error("Invalid email or password")]
    Unauthorized,
    #[error("Too many failed login attempts, try again later")]
    Locked { retry_after_seconds: u64 },
    #[error("An account with this email already exists")]
    Conflict,
    #[error("Too many registration attempts, try again later")]
    RateLimited { retry_after_seconds: u64 },
    #[error("Internal error")]
    Internal,
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Malformed | Self::Authentication => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Locked { .. } | Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn retry_after(&self) -> Option<u64> {
        match self {
            Self::Locked {
                retry_after_seconds,
            }
            | Self::RateLimited {
                retry_after_seconds,
            } => Some(*retry_after_seconds),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        error!("Internal error: {err:?}");
        Self::Internal
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), self.to_string()).into_response();
        if let Some(seconds) = self.retry_after() {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(AuthError::Malformed.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::Authentication.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::Locked {
                retry_after_seconds: 1
            }
            .status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(AuthError::Conflict.status(), StatusCode::CONFLICT);
        assert_eq!(
            AuthError::RateLimited {
                retry_after_seconds: 1
            }
            .status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AuthError::Internal.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn locked_response_carries_retry_after() {
        let response = AuthError::Locked {
            retry_after_seconds: 321,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(RETRY_AFTER).unwrap().to_str().unwrap(),
            "321"
        );
    }

    #[test]
    fn internal_errors_are_sanitized() {
        let err: AuthError = anyhow::anyhow!("pool timeout talking to accounts db").into();
        assert_eq!(err, AuthError::Internal);
        assert_eq!(err.to_string(), "Internal error");
    }
}

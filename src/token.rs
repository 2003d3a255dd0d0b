//! Session token signing and verification.
//!
//! HS256 JWTs. Tokens are stateless: once issued they stay valid until
//! `exp`; logout only clears client-side state. The `jti` claim exists to
//! support a future revocation list and is otherwise unused.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const ISSUER: &str = "neuromotion-auth";
pub const AUDIENCE: &str = "neuromotion-platform";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionTokenHeader {
    pub alg: String,
    pub typ: String,
}

impl SessionTokenHeader {
    fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub iss: String,
    pub aud: String,
    /// Account id
    pub sub: String,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl SessionClaims {
    #[must_use]
    pub fn new(subject: &str, email: &str, role: &str, ttl_minutes: i64) -> Self {
        let now = Utc::now();
        Self {
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            sub: subject.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(ttl_minutes)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("invalid audience")]
    InvalidAudience,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Create an HS256 signed session token.
///
/// # Errors
///
/// Returns an error if claims/header JSON cannot be encoded or the secret
/// is rejected by the MAC.
pub fn sign_hs256(secret: &[u8], claims: &SessionClaims) -> Result<String, Error> {
    let header_b64 = b64e_json(&SessionTokenHeader::hs256())?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| Error::InvalidSignature)?;
    mac.update(signing_input.as_bytes());
    let signature = mac.finalize().into_bytes();

    Ok(format!(
        "{signing_input}.{}",
        Base64UrlUnpadded::encode_string(&signature)
    ))
}

/// Verify signature, issuer, audience, and expiry; return the claims.
///
/// # Errors
///
/// Returns the first check that fails; the MAC comparison itself is
/// constant-time.
pub fn verify_hs256(secret: &[u8], token: &str) -> Result<SessionClaims, Error> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::TokenFormat);
    };

    let header: SessionTokenHeader = b64d_json(header_b64)?;
    if header.alg != "HS256" {
        return Err(Error::UnsupportedAlg(header.alg));
    }

    let signature = Base64UrlUnpadded::decode_vec(signature_b64).map_err(|_| Error::Base64)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| Error::InvalidSignature)?;
    mac.update(signing_input.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| Error::InvalidSignature)?;

    let claims: SessionClaims = b64d_json(claims_b64)?;

    if claims.iss != ISSUER {
        return Err(Error::InvalidIssuer);
    }
    if claims.aud != AUDIENCE {
        return Err(Error::InvalidAudience);
    }
    if claims.exp <= Utc::now().timestamp() {
        return Err(Error::Expired);
    }

    Ok(claims)
}

/// Decode claims without verifying the signature.
///
/// The client-side watchdog only needs `exp` to schedule renewal; it never
/// holds the signing secret, so it cannot (and must not pretend to)
/// authenticate the token.
///
/// # Errors
///
/// Returns an error if the token is not three base64url JSON segments.
pub fn peek_claims(token: &str) -> Result<SessionClaims, Error> {
    let mut parts = token.split('.');
    let (Some(_), Some(claims_b64), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::TokenFormat);
    };

    b64d_json(claims_b64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-signing-secret";

    fn claims() -> SessionClaims {
        SessionClaims::new("a2f1…", "alice@example.com", "patient", 60)
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let claims = claims();
        let token = sign_hs256(SECRET, &claims).unwrap();
        let verified = verify_hs256(SECRET, &token).unwrap();
        assert_eq!(verified, claims);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign_hs256(SECRET, &claims()).unwrap();
        assert!(matches!(
            verify_hs256(b"other-secret", &token),
            Err(Error::InvalidSignature)
        ));
    }

    #[test]
    fn tampered_claims_are_rejected() {
        let token = sign_hs256(SECRET, &claims()).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let mut forged = claims();
        forged.role = "admin".to_string();
        let forged_b64 = b64e_json(&forged).unwrap();
        parts[1] = &forged_b64;
        let forged_token = parts.join(".");
        assert!(matches!(
            verify_hs256(SECRET, &forged_token),
            Err(Error::InvalidSignature)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut expired = claims();
        expired.iat -= 3600;
        expired.exp = Utc::now().timestamp() - 60;
        let token = sign_hs256(SECRET, &expired).unwrap();
        assert!(matches!(verify_hs256(SECRET, &token), Err(Error::Expired)));
    }

    #[test]
    fn wrong_issuer_and_audience_are_rejected() {
        let mut claims = claims();
        claims.iss = "someone-else".to_string();
        let token = sign_hs256(SECRET, &claims).unwrap();
        assert!(matches!(
            verify_hs256(SECRET, &token),
            Err(Error::InvalidIssuer)
        ));

        let mut claims = self::claims();
        claims.aud = "other-audience".to_string();
        let token = sign_hs256(SECRET, &claims).unwrap();
        assert!(matches!(
            verify_hs256(SECRET, &token),
            Err(Error::InvalidAudience)
        ));
    }

    #[test]
    fn garbage_is_a_format_error() {
        assert!(matches!(
            verify_hs256(SECRET, "definitely-not-a-token"),
            Err(Error::TokenFormat)
        ));
        assert!(matches!(
            verify_hs256(SECRET, "a.b.c.d"),
            Err(Error::TokenFormat)
        ));
    }

    #[test]
    fn peek_reads_claims_without_secret() {
        let claims = claims();
        let token = sign_hs256(SECRET, &claims).unwrap();
        let peeked = peek_claims(&token).unwrap();
        assert_eq!(peeked.exp, claims.exp);
        assert_eq!(peeked.email, claims.email);
    }

    #[test]
    fn jti_is_unique_per_issue() {
        let first = SessionClaims::new("id", "a@b.co", "patient", 60);
        let second = SessionClaims::new("id", "a@b.co", "patient", 60);
        assert_ne!(first.jti, second.jti);
    }
}

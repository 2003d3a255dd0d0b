//! Dual-shape request classification and the decrypt pipeline.
//!
//! A request body either structurally matches an `EncryptedEnvelope` or is
//! a plaintext credential object (backward compatibility). Classification
//! produces a well-typed shape before any business logic runs; a body that
//! looks encrypted is committed to the encrypted path and never silently
//! re-tried as plaintext.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::AuthError;
use crate::envelope::{self, EncryptedEnvelope, KEY_LEN};

enum Shape {
    Encrypted(EncryptedEnvelope),
    Plain,
}

/// Run the classify → decrypt → deserialize pipeline for a request body.
///
/// # Errors
///
/// `Malformed` for a body that is not an object, a partial envelope, or a
/// plaintext shape that does not parse. `Authentication` for any failure
/// past the envelope boundary: decode, decrypt, or deserialize. Which of
/// those failed is never distinguished.
pub(super) fn parse_credentials<T: DeserializeOwned>(
    body: &Value,
    key: &[u8; KEY_LEN],
) -> Result<T, AuthError> {
    match classify(body)? {
        Shape::Encrypted(sealed) => {
            let plaintext = envelope::open(key, &sealed).map_err(|_| AuthError::Authentication)?;
            serde_json::from_slice(&plaintext).map_err(|_| AuthError::Authentication)
        }
        Shape::Plain => serde_json::from_value(body.clone()).map_err(|_| AuthError::Malformed),
    }
}

/// Field names are matched case-insensitively to tolerate client casing
/// drift (`Nonce`, `CipherText`, `TAG`, ...).
fn classify(body: &Value) -> Result<Shape, AuthError> {
    let Value::Object(map) = body else {
        return Err(AuthError::Malformed);
    };

    let field = |name: &str| {
        map.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    };

    let nonce = field("nonce");
    let ciphertext = field("ciphertext");
    let tag = field("tag");

    if nonce.is_none() && ciphertext.is_none() && tag.is_none() {
        return Ok(Shape::Plain);
    }

    match (as_string(nonce), as_string(ciphertext), as_string(tag)) {
        (Some(nonce), Some(ciphertext), Some(tag)) => Ok(Shape::Encrypted(EncryptedEnvelope {
            nonce,
            ciphertext,
            tag,
        })),
        _ => Err(AuthError::Malformed),
    }
}

fn as_string(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

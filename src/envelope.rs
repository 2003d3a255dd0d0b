//! Authenticated encryption envelope for credential payloads.
//!
//! AES-256-GCM. Key size: 32 bytes. Nonce: 12 bytes (random per seal).
//! Tag: 16 bytes, carried detached.
//!
//! Wire format is three Base64 text fields:
//!   `{ "nonce": ..., "ciphertext": ..., "tag": ... }`
//!
//! This envelope rides on top of TLS as defense in depth; it does not
//! replace transport security.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use zeroize::Zeroizing;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("encryption failed")]
    Seal,
    /// Single opaque failure for every open problem: bad encoding, bad
    /// lengths, tampered ciphertext or tag. Callers must not learn which.
    #[error("authentication failed")]
    Authentication,
}

/// An encrypted credential payload as it travels on the wire.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
pub struct EncryptedEnvelope {
    /// Base64, 12 bytes decoded
    pub nonce: String,
    /// Base64, variable length
    pub ciphertext: String,
    /// Base64, 16 bytes decoded
    pub tag: String,
}

/// Encrypt `plaintext`, drawing a fresh random nonce from the OS CSPRNG.
///
/// # Errors
///
/// Returns `EnvelopeError::Seal` if the cipher rejects the key or the
/// encryption itself fails.
pub fn seal(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<EncryptedEnvelope, EnvelopeError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EnvelopeError::Seal)?;

    // Never derive the nonce from content; reuse under the same key breaks GCM.
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let sealed = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad: b"",
            },
        )
        .map_err(|_| EnvelopeError::Seal)?;

    // aes-gcm appends the tag; split it into its own wire field.
    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

    Ok(EncryptedEnvelope {
        nonce: STANDARD.encode(nonce),
        ciphertext: STANDARD.encode(ciphertext),
        tag: STANDARD.encode(tag),
    })
}

/// Decrypt an envelope. All-or-nothing: any malformed field or tamper in
/// ciphertext or tag yields the same `Authentication` failure.
///
/// # Errors
///
/// Returns `EnvelopeError::Authentication` on any decode or verify failure.
pub fn open(
    key: &[u8; KEY_LEN],
    envelope: &EncryptedEnvelope,
) -> Result<Zeroizing<Vec<u8>>, EnvelopeError> {
    let nonce_bytes = decode_exact(&envelope.nonce, NONCE_LEN)?;
    let tag = decode_exact(&envelope.tag, TAG_LEN)?;
    let ciphertext = STANDARD
        .decode(envelope.ciphertext.trim())
        .map_err(|_| EnvelopeError::Authentication)?;

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EnvelopeError::Authentication)?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let mut sealed = ciphertext;
    sealed.extend_from_slice(&tag);

    let plaintext = cipher
        .decrypt(
            nonce,
            Payload {
                msg: &sealed,
                aad: b"",
            },
        )
        .map_err(|_| EnvelopeError::Authentication)?;

    Ok(Zeroizing::new(plaintext))
}

fn decode_exact(encoded: &str, len: usize) -> Result<Vec<u8>, EnvelopeError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|_| EnvelopeError::Authentication)?;
    if bytes.len() != len {
        return Err(EnvelopeError::Authentication);
    }
    Ok(bytes)
}

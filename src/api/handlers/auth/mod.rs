//! Credential exchange and abuse protection.
//!
//! Flow: the client fetches the shared AEAD key (`/crypto/key`, disabled in
//! production), seals its credentials into an envelope, and posts it to
//! `/user/login` or `/user/register`. The server classifies the body
//! (encrypted vs. plaintext), decrypts and validates it, consults the abuse
//! guard, and on success issues an HS256 session token.
//!
//! ## Abuse protection
//!
//! - **Login lockout:** 5 failures per (IP, email) within 15 minutes lock
//!   the pair out until the window elapses or a login succeeds.
//! - **Registration throttle:** 3 registrations per IP per trailing 24 hours.
//!
//! Tokens are stateless; logout is purely client-side and an issued token
//! stays valid until expiry.

pub(crate) mod credentials;
pub mod crypto_key;
mod error;
mod guard;
pub mod login;
pub mod refresh;
pub mod register;
mod state;
mod storage;
pub mod types;
mod utils;

pub use error::AuthError;
pub use guard::{AbuseGuard, LoginGate, RegistrationGate};
pub use state::{AuthConfig, AuthState, Environment};
pub use storage::{
    hash_password, verify_password, AccountRecord, AccountStore, CreateOutcome,
    MemoryAccountStore, NewAccount, PgAccountStore,
};

pub(crate) use utils::extract_client_ip;

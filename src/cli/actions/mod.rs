pub mod server;

use crate::api::handlers::auth::Environment;
use secrecy::{SecretBox, SecretString};

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        environment: Environment,
        envelope_key: SecretBox<[u8; 32]>,
        token_secret: SecretString,
        token_ttl_minutes: i64,
        frontend_url: String,
    },
}

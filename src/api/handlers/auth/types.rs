//! Request/response types for the credential-exchange endpoints.
//!
//! Login and register accept either an `EncryptedEnvelope` or one of these
//! plaintext shapes; classification happens in `credentials.rs` before any
//! business logic runs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, alias = "rememberMe")]
    pub remember_me: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AccountSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub token: String,
    pub account: AccountSummary,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct KeyResponse {
    /// Base64, 32 bytes decoded
    pub key: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    #[test]
    fn login_request_accepts_camel_case_remember_me() -> Result<()> {
        let request: LoginRequest = serde_json::from_value(json!({
            "email": "alice@example.com",
            "password": "tremor2024",
            "rememberMe": true
        }))?;
        assert!(request.remember_me);
        assert_eq!(request.role, None);
        Ok(())
    }

    #[test]
    fn login_request_defaults_optional_fields() -> Result<()> {
        let request: LoginRequest = serde_json::from_value(json!({
            "email": "alice@example.com",
            "password": "tremor2024"
        }))?;
        assert!(!request.remember_me);
        Ok(())
    }

    #[test]
    fn register_request_round_trips() -> Result<()> {
        let request = RegisterRequest {
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "tremor2024".to_string(),
            role: Some("patient".to_string()),
        };
        let value = serde_json::to_value(&request)?;
        let decoded: RegisterRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.email, "alice@example.com");
        assert_eq!(decoded.role.as_deref(), Some("patient"));
        Ok(())
    }
}

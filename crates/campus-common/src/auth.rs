//! Shared JWT authentication utilities.
//!
//! Token issuance belongs to the platform's auth service; this backend only
//! verifies tokens. Claims and validation live here so both campus-api and
//! campus-gateway can use them without circular dependencies.

use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::models::role::Role;

/// JWT claims embedded in platform access tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as string)
    pub sub: String,
    /// Display name, denormalized into messages at send time
    pub display_name: String,
    /// Platform-wide role carried by the token
    #[serde(default)]
    pub global_role: Role,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Validate and decode a JWT token.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

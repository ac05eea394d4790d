//! JWT validation helpers
//!
//! This side only validates tokens; issuance lives with the identity
//! service. The RSA public key is installed once at startup and every
//! request after that validates against the cached decoding key.

use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const JWT_ALGORITHM: Algorithm = Algorithm::RS256;

static JWT_DECODING_KEY: OnceCell<DecodingKey> = OnceCell::new();

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("jwt validation key not initialized")]
    NotInitialized,

    #[error("invalid validation key: {0}")]
    InvalidKey(String),

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("unexpected token type: {0}")]
    WrongTokenType(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Token type: "access" or "refresh"
    pub token_type: String,
}

/// Install the RS256 public key used to validate incoming tokens.
///
/// Idempotent: the first key wins, later calls are ignored.
pub fn init_validation(public_key_pem: &str) -> Result<(), JwtError> {
    let key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
        .map_err(|e| JwtError::InvalidKey(e.to_string()))?;
    let _ = JWT_DECODING_KEY.set(key);
    Ok(())
}

/// Validate an access token and return its claims.
///
/// Refresh tokens are rejected; they are only good for the identity
/// service's refresh endpoint.
pub fn validate_token(token: &str) -> Result<TokenData<Claims>, JwtError> {
    let key = JWT_DECODING_KEY.get().ok_or(JwtError::NotInitialized)?;

    let validation = Validation::new(JWT_ALGORITHM);
    let data = decode::<Claims>(token, key, &validation)
        .map_err(|e| JwtError::InvalidToken(e.to_string()))?;

    if data.claims.token_type != "access" {
        return Err(JwtError::WrongTokenType(data.claims.token_type));
    }

    Ok(data)
}

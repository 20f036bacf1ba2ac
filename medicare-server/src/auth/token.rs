use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Claims carried by a session token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    /// Account id
    pub id: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

/// Issues and verifies HS256 session tokens.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_days: i64,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl_days: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_days,
        }
    }

    /// Issue a fresh session token for an account.
    pub fn issue(&self, account_id: &str) -> Result<String, TokenError> {
        let exp = Utc::now().timestamp() + self.ttl_days * 24 * 60 * 60;
        self.issue_expiring_at(account_id, exp)
    }

    pub fn issue_expiring_at(&self, account_id: &str, exp: i64) -> Result<String, TokenError> {
        let claims = SessionClaims {
            id: account_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: Utc::now().timestamp(),
            exp,
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Cryptographic check only: signature and expiry, no leeway.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.validate_aud = false;

        decode::<SessionClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })
    }
}

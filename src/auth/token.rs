//! JWT issuance and verification.
//!
//! Tokens are HS256-signed bearer credentials whose subject is the user id.
//! They are stateless: nothing is stored server-side, so a token stays
//! valid until its expiry regardless of restarts (as long as the secret is
//! stable).

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::identity::Identity;
use crate::error::{ApiError, Result};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// User id, stringified.
    sub: String,
    iat: i64,
    exp: i64,
}

/// Issues and verifies bearer tokens for one signing secret.
pub struct TokenManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_days: i64,
}

impl TokenManager {
    pub fn new(secret: &str, ttl_days: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_days,
        }
    }

    /// Sign a token for `user_id`.
    pub fn issue(&self, user_id: i64) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + chrono::Duration::days(self.ttl_days)).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::Server(format!("Token signing failed: {e}")))
    }

    /// Verify a presented token. Malformed, expired, or forged tokens all
    /// collapse into `InvalidCredential`; the caller learns nothing about
    /// which check failed.
    pub fn verify(&self, token: &str) -> Result<Identity> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|_| ApiError::InvalidCredential)?;
        let user_id = data
            .claims
            .sub
            .parse::<i64>()
            .map_err(|_| ApiError::InvalidCredential)?;
        Ok(Identity(user_id))
    }
}

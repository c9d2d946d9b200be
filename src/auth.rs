//! Password hashing and bearer-token issuance.
//!
//! Hashing uses bcrypt and runs on Tokio's blocking pool so a burst of
//! signups cannot stall the request executor. Tokens are HS256 JWTs that
//! carry the user id and role.

use std::time::Duration;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::types::Role;

/// Claims embedded in every issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: i32,
    pub role: Role,
    /// Issued at (seconds since epoch).
    pub iat: u64,
    /// Expiration (seconds since epoch).
    pub exp: u64,
}

/// Signing material and lifetime for tokens, built once at startup.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self::new(&cfg.auth.jwt_secret, cfg.token_ttl()?))
    }

    /// Signs a token for `id`/`role` valid for the configured lifetime.
    pub fn issue(&self, id: i32, role: Role) -> AppResult<String> {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        self.sign(&Claims { id, role, iat: now, exp: now.saturating_add(self.ttl.as_secs()) })
    }

    /// Signs arbitrary claims. `issue` is the normal entry point.
    pub fn sign(&self, claims: &Claims) -> AppResult<String> {
        encode(&Header::default(), claims, &self.encoding)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("token signing failed: {}", e)))
    }

    /// Verifies signature and expiry. Every failure maps to the same 401.
    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Token rejected: {}", e);
                AppError::Unauthorized("Invalid or expired token".to_string())
            })
    }
}

/// Hashes a password with bcrypt at `cost`.
pub async fn hash_password(password: String, cost: u32) -> AppResult<String> {
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
    Ok(hash)
}

/// Checks `password` against a stored bcrypt hash.
pub async fn verify_password(password: String, hash: String) -> AppResult<bool> {
    let ok = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;
    Ok(ok)
}

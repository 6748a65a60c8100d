//! Session token signing and verification.
//!
//! Tokens are HS256 JWTs carrying the admin email and a session record
//! id. Verification enforces issuer and audience and runs with zero
//! leeway, so a past `exp` never passes. A good signature alone is not
//! enough to be logged in; `session.rs` still checks the record.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::errors::{AuthError, AuthResult};

/// Claims carried by a session token.
///
/// `sub` is the admin email and `sid` the session record id; the rest
/// are the standard registered claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub sid: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Signing parameters for session tokens.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC secret; at least 32 bytes in production.
    pub secret: String,
    pub token_ttl: Duration,
    pub issuer: String,
    pub audience: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "CHANGE_ME_SET_JWT_SECRET".to_string(),
            token_ttl: Duration::hours(1),
            issuer: "folio".to_string(),
            audience: "folio-admin".to_string(),
        }
    }
}

/// Signs and verifies session tokens with a shared HMAC secret.
#[derive(Clone)]
pub struct TokenSigner {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenSigner {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self { config, encoding_key, decoding_key }
    }

    /// Sign a token binding `email` to the session record `session_id`.
    ///
    /// Returns the token together with its expiry instant.
    pub fn issue(&self, email: &str, session_id: &str) -> AuthResult<(String, DateTime<Utc>)> {
        let issued_at = Utc::now();
        let expires_at = issued_at + self.config.token_ttl;
        let claims = SessionClaims {
            sub: email.to_owned(),
            sid: session_id.to_owned(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|_| AuthError::TokenGenerationFailed)?;
        Ok((token, expires_at))
    }

    /// Check signature, issuer, audience, and expiry, then return the
    /// claims.
    pub fn verify(&self, token: &str) -> AuthResult<SessionClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);
        // The crate default allows 60s of clock drift; expiry is exact.
        validation.leeway = 0;

        let data = decode::<SessionClaims>(token, &self.decoding_key, &validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::MalformedToken,
            },
        )?;
        Ok(data.claims)
    }
}

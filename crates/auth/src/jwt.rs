//! Signed session tokens.
//!
//! Sessions are stateless: the cookie (or bearer token) is an HS256 JWT
//! carrying `SessionClaims`. Nothing is stored server side.

use std::time::Duration;

use chrono::Utc;
use gatehouse_core::auth::{session_claims, AuthError, Result, SessionClaims, SignInMethod};
use gatehouse_core::directory::User;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

/// Encodes and verifies session tokens with a shared secret.
#[derive(Clone)]
pub struct SessionCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl SessionCodec {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `user`, valid for the configured TTL.
    pub fn issue(&self, user: &User, method: SignInMethod) -> Result<String> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| AuthError::InvalidToken(format!("session TTL out of range: {e}")))?;
        let claims = session_claims(user, method, Utc::now(), ttl);
        self.encode(&claims)
    }

    pub fn encode(&self, claims: &SessionClaims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::InvalidToken(format!("failed to sign session: {e}")))
    }

    /// Verify signature and expiry, returning the claims.
    pub fn decode(&self, token: &str) -> Result<SessionClaims> {
        decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

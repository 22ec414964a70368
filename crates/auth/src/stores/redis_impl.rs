//! Redis flow and code storage implementation.

use async_trait::async_trait;
use fred::prelude::*;
use gatehouse_core::auth::{
    AuthError, AuthFlowRepository, AuthFlowState, Result, VerificationCode,
    VerificationCodeRepository, AUTH_FLOW_TTL_MINUTES, MAX_CODE_ATTEMPTS,
};
use std::time::Duration;

/// Replaces whatever code the email had, resetting the attempt counter.
///
/// KEYS[1] code hash, ARGV[1] code, ARGV[2] JSON payload, ARGV[3] TTL seconds
const STORE_CODE_SCRIPT: &str = r#"
redis.call('DEL', KEYS[1])
redis.call('HSET', KEYS[1], 'code', ARGV[1], 'payload', ARGV[2], 'failed_attempts', 0)
redis.call('EXPIRE', KEYS[1], ARGV[3])
return 1
"#;

/// Returns the payload and deletes the hash on a match. On a mismatch bumps
/// the attempt counter and deletes the hash once the limit is reached.
///
/// KEYS[1] code hash, ARGV[1] guessed code, ARGV[2] attempt limit
const TAKE_CODE_SCRIPT: &str = r#"
local stored = redis.call('HGET', KEYS[1], 'code')
if not stored then
  return nil
end
if stored == ARGV[1] then
  local payload = redis.call('HGET', KEYS[1], 'payload')
  redis.call('DEL', KEYS[1])
  return payload
end
local failed = redis.call('HINCRBY', KEYS[1], 'failed_attempts', 1)
if failed >= tonumber(ARGV[2]) then
  redis.call('DEL', KEYS[1])
end
return nil
"#;

/// Redis-backed storage for auth flows and verification codes.
///
/// Both kinds of entries carry a Redis TTL, so abandoned flows and unused
/// codes disappear on their own. Each code operation runs as one Lua
/// script, so concurrent requests for the same email never leave two live
/// codes or lose an attempt count.
pub struct RedisAuthStore {
    pool: Pool,
    flow_ttl: Duration,
    code_ttl: Duration,
}

impl RedisAuthStore {
    /// Creates a new Redis store.
    ///
    /// # Arguments
    ///
    /// * `pool` - Redis connection pool
    /// * `code_ttl` - TTL for emailed verification codes
    pub fn new(pool: Pool, code_ttl: Duration) -> Self {
        Self {
            pool,
            flow_ttl: Duration::from_secs(AUTH_FLOW_TTL_MINUTES as u64 * 60),
            code_ttl,
        }
    }

    fn flow_key(state: &str) -> String {
        format!("auth_flow:{}", state)
    }

    fn code_key(email: &str) -> String {
        format!("verification_code:{}", email)
    }
}

#[async_trait]
impl AuthFlowRepository for RedisAuthStore {
    async fn store_auth_flow(&self, state: &str, flow: &AuthFlowState) -> Result<()> {
        let value = serde_json::to_string(flow).map_err(|e| AuthError::Storage(e.to_string()))?;
        self.pool
            .set::<(), _, _>(
                Self::flow_key(state),
                value,
                Some(Expiration::EX(self.flow_ttl.as_secs() as i64)),
                None,
                false,
            )
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))
    }

    async fn take_auth_flow(&self, state: &str) -> Result<Option<AuthFlowState>> {
        let key = Self::flow_key(state);

        // Get and delete atomically
        let value: Option<String> = self
            .pool
            .getdel(&key)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        match value {
            Some(json) => {
                let flow: AuthFlowState =
                    serde_json::from_str(&json).map_err(|e| AuthError::Storage(e.to_string()))?;
                Ok(Some(flow))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl VerificationCodeRepository for RedisAuthStore {
    async fn store_code(&self, code: &VerificationCode) -> Result<()> {
        let payload =
            serde_json::to_string(code).map_err(|e| AuthError::Storage(e.to_string()))?;

        self.pool
            .eval::<i64, _, _, _>(
                STORE_CODE_SCRIPT,
                vec![Self::code_key(&code.email)],
                vec![
                    code.code.clone(),
                    payload,
                    self.code_ttl.as_secs().max(1).to_string(),
                ],
            )
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn take_code(&self, email: &str, code: &str) -> Result<Option<VerificationCode>> {
        let payload: Option<String> = self
            .pool
            .eval(
                TAKE_CODE_SCRIPT,
                vec![Self::code_key(email)],
                vec![code.to_string(), MAX_CODE_ATTEMPTS.to_string()],
            )
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        payload
            .map(|json| serde_json::from_str(&json).map_err(|e| AuthError::Storage(e.to_string())))
            .transpose()
    }
}

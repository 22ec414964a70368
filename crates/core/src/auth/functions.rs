use chrono::{DateTime, Duration, Utc};
use rand::{distr::Alphanumeric, Rng};

use super::{AuthFlowState, SessionClaims, SignInMethod, VerificationCode};
use crate::directory::User;

/// Number of digits in an emailed sign-in code.
pub const VERIFICATION_CODE_LENGTH: usize = 6;

/// Wrong guesses tolerated against one emailed code before it is discarded.
pub const MAX_CODE_ATTEMPTS: u32 = 5;

/// Minutes an OIDC flow may sit between the login redirect and the callback.
pub const AUTH_FLOW_TTL_MINUTES: i64 = 10;

/// Lifetime of a stored OIDC flow.
pub fn auth_flow_ttl() -> Duration {
    Duration::minutes(AUTH_FLOW_TTL_MINUTES)
}

/// Generate a random state parameter for CSRF protection.
pub fn generate_state() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Generate a random six-digit sign-in code, zero padded.
pub fn generate_verification_code() -> String {
    let n: u32 = rand::rng().random_range(0..1_000_000);
    format!("{:0width$}", n, width = VERIFICATION_CODE_LENGTH)
}

/// Calculate expiry from creation time and TTL.
pub fn calculate_expiry(created_at: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    created_at + ttl
}

/// Check if a verification code can no longer be redeemed.
pub fn is_code_expired(code: &VerificationCode, now: DateTime<Utc>) -> bool {
    code.expires_at <= now
}

/// Check if an OIDC flow is too old to be completed.
pub fn is_flow_expired(flow: &AuthFlowState, now: DateTime<Utc>, ttl: Duration) -> bool {
    calculate_expiry(flow.created_at, ttl) <= now
}

/// Whether `failed_attempts` wrong guesses use up a code.
pub fn attempts_exhausted(failed_attempts: u32) -> bool {
    failed_attempts >= MAX_CODE_ATTEMPTS
}

/// Build the session claims for a signed-in user.
pub fn session_claims(
    user: &User,
    method: SignInMethod,
    issued_at: DateTime<Utc>,
    ttl: Duration,
) -> SessionClaims {
    SessionClaims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        name: user.name.clone(),
        method,
        iat: issued_at.timestamp(),
        exp: calculate_expiry(issued_at, ttl).timestamp(),
    }
}

/// Extract username from email if no name provided.
pub fn email_to_name(email: &str) -> String {
    match email.split('@').next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => "User".to_string(),
    }
}

//! Verification code delivery.
//!
//! Real email transport is plugged in by the embedding application through
//! `CodeMailer`. `LogMailer` only writes the code to the log, for local
//! development.

use async_trait::async_trait;
use gatehouse_core::auth::{CodeMailer, Result, VerificationCode};

/// Logs sign-in codes instead of sending them. Development only.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl CodeMailer for LogMailer {
    async fn send_code(&self, code: &VerificationCode) -> Result<()> {
        tracing::info!(
            email = %code.email,
            code = %code.code,
            expires_at = %code.expires_at,
            "verification code issued (log delivery)"
        );
        Ok(())
    }
}

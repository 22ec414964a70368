//! SQLite flow and code storage implementation.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use gatehouse_core::auth::{
    attempts_exhausted, auth_flow_ttl, AuthError, AuthFlowRepository, AuthFlowState, Result,
    VerificationCode, VerificationCodeRepository,
};
use sqlx::SqlitePool;

/// SQLite-backed storage for auth flows and verification codes.
pub struct SqliteAuthStore {
    pool: SqlitePool,
}

type FlowRow = (String, String, String, Option<String>);
type CodeRow = (String, String, String, String, Option<String>, i64);

impl SqliteAuthStore {
    /// Creates a new SQLite store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Runs database migrations to create required tables.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS auth_flows (
                state TEXT PRIMARY KEY,
                pkce_verifier TEXT NOT NULL,
                provider TEXT NOT NULL,
                created_at TEXT NOT NULL,
                return_to TEXT
            );

            CREATE TABLE IF NOT EXISTS verification_codes (
                email TEXT PRIMARY KEY,
                code TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                return_to TEXT,
                failed_attempts INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }
}

#[async_trait]
impl AuthFlowRepository for SqliteAuthStore {
    async fn store_auth_flow(&self, state: &str, flow: &AuthFlowState) -> Result<()> {
        sqlx::query("DELETE FROM auth_flows WHERE created_at <= ?")
            .bind(timestamp(Utc::now() - auth_flow_ttl()))
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        sqlx::query(
            "INSERT OR REPLACE INTO auth_flows (state, pkce_verifier, provider, created_at, return_to) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(state)
        .bind(&flow.pkce_verifier)
        .bind(flow.provider.to_string())
        .bind(timestamp(flow.created_at))
        .bind(&flow.return_to)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }

    async fn take_auth_flow(&self, state: &str) -> Result<Option<AuthFlowState>> {
        // Begin transaction to make SELECT and DELETE atomic, preventing replay attacks
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let row = sqlx::query_as::<_, FlowRow>(
            "SELECT pkce_verifier, provider, created_at, return_to FROM auth_flows WHERE state = ? AND created_at > ?",
        )
        .bind(state)
        .bind(timestamp(Utc::now() - auth_flow_ttl()))
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage)?;

        // Expired rows go too, so a stale state cannot be retried
        sqlx::query("DELETE FROM auth_flows WHERE state = ?")
            .bind(state)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        tx.commit().await.map_err(storage)?;

        match row {
            Some((pkce_verifier, provider, created_at, return_to)) => Ok(Some(AuthFlowState {
                pkce_verifier,
                provider: provider.parse()?,
                created_at: parse_timestamp(&created_at)?,
                return_to,
            })),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl VerificationCodeRepository for SqliteAuthStore {
    async fn store_code(&self, code: &VerificationCode) -> Result<()> {
        sqlx::query("DELETE FROM verification_codes WHERE expires_at <= ?")
            .bind(timestamp(Utc::now()))
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        // Replacing the row also resets failed_attempts
        sqlx::query(
            "INSERT OR REPLACE INTO verification_codes (email, code, created_at, expires_at, return_to) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&code.email)
        .bind(&code.code)
        .bind(timestamp(code.created_at))
        .bind(timestamp(code.expires_at))
        .bind(&code.return_to)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }

    async fn take_code(&self, email: &str, code: &str) -> Result<Option<VerificationCode>> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let row = sqlx::query_as::<_, CodeRow>(
            "SELECT email, code, created_at, expires_at, return_to, failed_attempts FROM verification_codes WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage)?;

        let Some((email, stored_code, created_at, expires_at, return_to, failed_attempts)) = row
        else {
            tx.commit().await.map_err(storage)?;
            return Ok(None);
        };

        if stored_code != code {
            let failed_attempts = u32::try_from(failed_attempts).unwrap_or(u32::MAX);
            let failed_attempts = failed_attempts.saturating_add(1);
            if attempts_exhausted(failed_attempts) {
                sqlx::query("DELETE FROM verification_codes WHERE email = ?")
                    .bind(&email)
                    .execute(&mut *tx)
                    .await
                    .map_err(storage)?;
            } else {
                sqlx::query("UPDATE verification_codes SET failed_attempts = ? WHERE email = ?")
                    .bind(i64::from(failed_attempts))
                    .bind(&email)
                    .execute(&mut *tx)
                    .await
                    .map_err(storage)?;
            }
            tx.commit().await.map_err(storage)?;
            return Ok(None);
        }

        sqlx::query("DELETE FROM verification_codes WHERE email = ?")
            .bind(&email)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        tx.commit().await.map_err(storage)?;

        Ok(Some(VerificationCode {
            email,
            code: stored_code,
            created_at: parse_timestamp(&created_at)?,
            expires_at: parse_timestamp(&expires_at)?,
            return_to,
        }))
    }
}

/// Fixed-width RFC 3339 so stored timestamps compare correctly as text.
fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AuthError::Storage(e.to_string()))
}

fn storage(e: sqlx::Error) -> AuthError {
    AuthError::Storage(e.to_string())
}

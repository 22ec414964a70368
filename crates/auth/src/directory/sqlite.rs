//! SQLite directory implementation.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use gatehouse_core::directory::{
    InviteRepository, MembershipRepository, OrganizationInvite, OrganizationMembership,
    RepositoryError, Result, User, UserRepository,
};
use sqlx::SqlitePool;
use uuid::Uuid;

/// SQLite-backed directory.
pub struct SqliteDirectory {
    pool: SqlitePool,
}

type UserRow = (String, String, String, String);

impl SqliteDirectory {
    /// Creates a new SQLite directory.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Runs database migrations to create required tables.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS organization_memberships (
                organization_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                role TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (organization_id, user_id)
            );
            CREATE INDEX IF NOT EXISTS idx_memberships_user_id ON organization_memberships(user_id);

            CREATE TABLE IF NOT EXISTS organization_invites (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                email TEXT NOT NULL,
                status TEXT NOT NULL,
                expires_at TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_invites_email ON organization_invites(email);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(())
    }

    /// Insert a membership record.
    pub async fn insert_membership(&self, membership: &OrganizationMembership) -> Result<()> {
        sqlx::query(
            "INSERT INTO organization_memberships (organization_id, user_id, role, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(membership.organization_id.to_string())
        .bind(membership.user_id.to_string())
        .bind(membership.role.as_str())
        .bind(timestamp(membership.created_at))
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(())
    }

    /// Insert an invite record.
    pub async fn insert_invite(&self, invite: &OrganizationInvite) -> Result<()> {
        sqlx::query(
            "INSERT INTO organization_invites (id, organization_id, email, status, expires_at, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(invite.id.to_string())
        .bind(invite.organization_id.to_string())
        .bind(&invite.email)
        .bind(invite.status.as_str())
        .bind(invite.expires_at.map(timestamp))
        .bind(timestamp(invite.created_at))
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(())
    }
}

#[async_trait]
impl UserRepository for SqliteDirectory {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, name, created_at FROM users WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed)?;

        row.map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, name, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed)?;

        row.map(user_from_row).transpose()
    }

    async fn create_user(&self, user: &User) -> Result<()> {
        sqlx::query("INSERT INTO users (id, email, name, created_at) VALUES (?, ?, ?, ?)")
            .bind(user.id.to_string())
            .bind(&user.email)
            .bind(&user.name)
            .bind(timestamp(user.created_at))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
                    RepositoryError::AlreadyExists {
                        entity_type: "User",
                        id: user.email.clone(),
                    }
                } else {
                    query_failed(e)
                }
            })?;

        Ok(())
    }
}

#[async_trait]
impl MembershipRepository for SqliteDirectory {
    async fn has_membership(&self, user_id: Uuid) -> Result<bool> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM organization_memberships WHERE user_id = ?)",
        )
        .bind(user_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(found != 0)
    }
}

#[async_trait]
impl InviteRepository for SqliteDirectory {
    async fn has_pending_invite(&self, email: &str) -> Result<bool> {
        let found = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM organization_invites
                WHERE email = ?
                  AND status = 'pending'
                  AND (expires_at IS NULL OR expires_at > ?)
            )
            "#,
        )
        .bind(email)
        .bind(timestamp(Utc::now()))
        .fetch_one(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(found != 0)
    }
}

/// Fixed-width UTC timestamps so that string comparison orders correctly.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::InvalidData(e.to_string()))
}

fn user_from_row((id, email, name, created_at): UserRow) -> Result<User> {
    Ok(User {
        id: id
            .parse()
            .map_err(|e: uuid::Error| RepositoryError::InvalidData(e.to_string()))?,
        email,
        name,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn query_failed(e: sqlx::Error) -> RepositoryError {
    RepositoryError::QueryFailed(e.to_string())
}

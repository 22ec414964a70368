use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::RepositoryError;
use crate::signup::normalize_email;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Always stored normalized (trimmed, lower-case).
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user with a fresh id. The email is normalized.
    pub fn new(email: &str, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// Role of a user inside an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganizationRole {
    Owner,
    Admin,
    Member,
}

impl OrganizationRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }
}

impl Display for OrganizationRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrganizationRole {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            other => Err(RepositoryError::InvalidData(format!(
                "unknown organization role: {other}"
            ))),
        }
    }
}

/// Links a user to an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationMembership {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role: OrganizationRole,
    pub created_at: DateTime<Utc>,
}

impl OrganizationMembership {
    pub fn new(organization_id: Uuid, user_id: Uuid, role: OrganizationRole) -> Self {
        Self {
            organization_id,
            user_id,
            role,
            created_at: Utc::now(),
        }
    }
}

/// Lifecycle of an organization invite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Revoked,
}

impl InviteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Revoked => "revoked",
        }
    }
}

impl Display for InviteStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InviteStatus {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "revoked" => Ok(Self::Revoked),
            other => Err(RepositoryError::InvalidData(format!(
                "unknown invite status: {other}"
            ))),
        }
    }
}

/// An invitation for an email address to join an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationInvite {
    pub id: Uuid,
    pub organization_id: Uuid,
    /// Always stored normalized (trimmed, lower-case).
    pub email: String,
    pub status: InviteStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl OrganizationInvite {
    /// Creates a pending invite without an expiry.
    pub fn pending(organization_id: Uuid, email: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            email: normalize_email(email),
            status: InviteStatus::Pending,
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_status(mut self, status: InviteStatus) -> Self {
        self.status = status;
        self
    }

    /// An invite is outstanding while it is pending and not past its expiry.
    pub fn is_pending(&self, now: DateTime<Utc>) -> bool {
        self.status == InviteStatus::Pending && self.expires_at.is_none_or(|at| at > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn user_new_normalizes_email() {
        let user = User::new("  Ana@Example.COM ", "Ana");
        assert_eq!(user.email, "ana@example.com");
    }

    #[test]
    fn invite_pending_normalizes_email() {
        let invite = OrganizationInvite::pending(Uuid::new_v4(), "Bob@Example.com");
        assert_eq!(invite.email, "bob@example.com");
        assert_eq!(invite.status, InviteStatus::Pending);
    }

    #[test]
    fn invite_without_expiry_is_pending() {
        let invite = OrganizationInvite::pending(Uuid::new_v4(), "bob@example.com");
        assert!(invite.is_pending(Utc::now()));
    }

    #[test]
    fn invite_past_expiry_is_not_pending() {
        let now = Utc::now();
        let invite = OrganizationInvite::pending(Uuid::new_v4(), "bob@example.com")
            .expiring_at(now - Duration::hours(1));
        assert!(!invite.is_pending(now));
    }

    #[test]
    fn invite_at_exact_expiry_is_not_pending() {
        let now = Utc::now();
        let invite =
            OrganizationInvite::pending(Uuid::new_v4(), "bob@example.com").expiring_at(now);
        assert!(!invite.is_pending(now));
    }

    #[test]
    fn accepted_or_revoked_invite_is_not_pending() {
        let org = Uuid::new_v4();
        let accepted =
            OrganizationInvite::pending(org, "bob@example.com").with_status(InviteStatus::Accepted);
        let revoked =
            OrganizationInvite::pending(org, "bob@example.com").with_status(InviteStatus::Revoked);
        assert!(!accepted.is_pending(Utc::now()));
        assert!(!revoked.is_pending(Utc::now()));
    }

    #[test]
    fn invite_status_round_trips_through_str() {
        for status in [
            InviteStatus::Pending,
            InviteStatus::Accepted,
            InviteStatus::Revoked,
        ] {
            assert_eq!(status.as_str().parse::<InviteStatus>().unwrap(), status);
        }
        assert!("expired".parse::<InviteStatus>().is_err());
    }

    #[test]
    fn organization_role_parses_known_roles() {
        assert_eq!(
            "admin".parse::<OrganizationRole>().unwrap(),
            OrganizationRole::Admin
        );
        assert!("guest".parse::<OrganizationRole>().is_err());
    }
}

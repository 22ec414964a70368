use async_trait::async_trait;
use uuid::Uuid;

use super::{Result, User};

/// Repository for user records.
///
/// Emails passed in are expected to be normalized already.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Gets a user by their ID.
    async fn get_user(&self, id: Uuid) -> Result<Option<User>>;

    /// Gets a user by their normalized email address.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Creates a new user. Fails with `AlreadyExists` if the email is taken.
    async fn create_user(&self, user: &User) -> Result<()>;
}

/// Read access to organization memberships.
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Whether the user belongs to at least one organization.
    async fn has_membership(&self, user_id: Uuid) -> Result<bool>;
}

/// Read access to organization invites.
#[async_trait]
pub trait InviteRepository: Send + Sync {
    /// Whether at least one pending invite exists for the normalized email,
    /// in any organization.
    async fn has_pending_invite(&self, email: &str) -> Result<bool>;
}

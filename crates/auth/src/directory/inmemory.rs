//! In-memory directory for development and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use gatehouse_core::directory::{
    InviteRepository, MembershipRepository, OrganizationInvite, OrganizationMembership,
    RepositoryError, Result, User, UserRepository,
};

/// In-memory directory.
///
/// Data lives in `Arc<RwLock<_>>` collections, so clones share state. Nothing
/// is persisted.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
    memberships: Arc<RwLock<Vec<OrganizationMembership>>>,
    invites: Arc<RwLock<Vec<OrganizationInvite>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a membership. Used to seed the directory.
    pub async fn add_membership(&self, membership: OrganizationMembership) {
        self.memberships.write().await.push(membership);
    }

    /// Record an invite. Used to seed the directory.
    pub async fn add_invite(&self, invite: OrganizationInvite) {
        self.invites.write().await.push(invite);
    }
}

#[async_trait]
impl UserRepository for InMemoryDirectory {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, user: &User) -> Result<()> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(RepositoryError::AlreadyExists {
                entity_type: "User",
                id: user.email.clone(),
            });
        }
        users.insert(user.id, user.clone());
        Ok(())
    }
}

#[async_trait]
impl MembershipRepository for InMemoryDirectory {
    async fn has_membership(&self, user_id: Uuid) -> Result<bool> {
        let memberships = self.memberships.read().await;
        Ok(memberships.iter().any(|m| m.user_id == user_id))
    }
}

#[async_trait]
impl InviteRepository for InMemoryDirectory {
    async fn has_pending_invite(&self, email: &str) -> Result<bool> {
        let now = Utc::now();
        let invites = self.invites.read().await;
        Ok(invites
            .iter()
            .any(|i| i.email == email && i.is_pending(now)))
    }
}

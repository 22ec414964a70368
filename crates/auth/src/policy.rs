//! Invite-only sign-in gate.
//!
//! Decides whether an email may authenticate. Checks run in order and stop
//! at the first match:
//!
//! 1. no usable email → deny
//! 2. email on the allow-list → allow (no lookups)
//! 3. existing user with at least one organization membership → allow
//! 4. pending invite for the email in any organization → allow
//! 5. otherwise → deny and log the email
//!
//! Lookups are read-only, sequential and individually bounded by a timeout.
//! A lookup that errors or times out denies the attempt.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use gatehouse_core::directory::{
    InviteRepository, MembershipRepository, RepositoryError, UserRepository,
};
use gatehouse_core::signup::{
    parse_candidate_email, AllowList, AllowReason, DenyReason, SignupDecision,
};
use thiserror::Error;

use crate::config::SignupConfig;

/// Why a directory lookup did not produce an answer.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("{lookup} lookup timed out after {timeout:?}")]
    Timeout {
        lookup: &'static str,
        timeout: Duration,
    },
}

/// The sign-in authorization policy.
///
/// Holds no mutable state; clones share the same allow-list and
/// repositories and can evaluate attempts concurrently.
#[derive(Clone)]
pub struct SignupPolicy {
    allow_list: Arc<AllowList>,
    users: Arc<dyn UserRepository>,
    memberships: Arc<dyn MembershipRepository>,
    invites: Arc<dyn InviteRepository>,
    lookup_timeout: Duration,
}

impl SignupPolicy {
    pub fn new(
        config: &SignupConfig,
        users: Arc<dyn UserRepository>,
        memberships: Arc<dyn MembershipRepository>,
        invites: Arc<dyn InviteRepository>,
    ) -> Self {
        Self {
            allow_list: Arc::new(config.allow_list.clone()),
            users,
            memberships,
            invites,
            lookup_timeout: config.lookup_timeout,
        }
    }

    /// Whether `candidate_email` may sign in or sign up.
    pub async fn authorize(&self, candidate_email: Option<&str>) -> bool {
        self.evaluate(candidate_email).await.is_allowed()
    }

    /// Same as [`authorize`](Self::authorize) but reports which rule decided.
    #[tracing::instrument(name = "signup_policy", skip_all)]
    pub async fn evaluate(&self, candidate_email: Option<&str>) -> SignupDecision {
        let Some(email) = parse_candidate_email(candidate_email) else {
            tracing::debug!("sign-in attempt without a usable email");
            return SignupDecision::Denied(DenyReason::MissingEmail);
        };

        if self.allow_list.contains(&email) {
            tracing::debug!(%email, "allow-listed email");
            return SignupDecision::Allowed(AllowReason::AllowListed);
        }

        match self.find_grant(&email).await {
            Ok(Some(reason)) => {
                tracing::debug!(%email, ?reason, "sign-in permitted");
                SignupDecision::Allowed(reason)
            }
            Ok(None) => {
                tracing::warn!(%email, "sign-in blocked: email is not allow-listed, a member or invited");
                SignupDecision::Denied(DenyReason::NotInvited)
            }
            Err(error) => {
                tracing::error!(%email, %error, "sign-in blocked: directory lookup failed");
                SignupDecision::Denied(DenyReason::LookupFailed)
            }
        }
    }

    async fn find_grant(&self, email: &str) -> Result<Option<AllowReason>, LookupError> {
        let user = self
            .bounded("user", self.users.find_user_by_email(email))
            .await?;

        if let Some(user) = user {
            let is_member = self
                .bounded("membership", self.memberships.has_membership(user.id))
                .await?;
            if is_member {
                return Ok(Some(AllowReason::Member));
            }
        }

        let invited = self
            .bounded("invite", self.invites.has_pending_invite(email))
            .await?;

        Ok(invited.then_some(AllowReason::Invited))
    }

    async fn bounded<T>(
        &self,
        lookup: &'static str,
        query: impl Future<Output = Result<T, RepositoryError>>,
    ) -> Result<T, LookupError> {
        match tokio::time::timeout(self.lookup_timeout, query).await {
            Ok(result) => result.map_err(LookupError::from),
            Err(_) => Err(LookupError::Timeout {
                lookup,
                timeout: self.lookup_timeout,
            }),
        }
    }
}

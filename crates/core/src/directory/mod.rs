//! Users, organization memberships and organization invites.
//!
//! The sign-in policy only reads these records; the traits here are the
//! seam between the policy and whichever storage backs the directory.

mod error;
mod traits;
mod types;

pub use error::{RepositoryError, Result};
pub use traits::{InviteRepository, MembershipRepository, UserRepository};
pub use types::{InviteStatus, OrganizationInvite, OrganizationMembership, OrganizationRole, User};

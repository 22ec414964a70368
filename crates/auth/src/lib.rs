//! Invite-only sign-in for gatehouse.
//!
//! This crate provides:
//! - The sign-in policy (allow list, organization membership, pending invite)
//! - OIDC flows with Google and Apple providers
//! - Email one-time-code sign-in
//! - Stateless JWT sessions and an Axum extractor for them
//! - Flow/code storage (SQLite or Redis via feature flags, memory always)

mod config;
mod directory;
mod error;
mod extractors;
mod handlers;
mod jwt;
mod mailer;
mod policy;
mod providers;
mod state;
mod stores;

pub use config::{AppleConfig, AuthConfig, ProviderConfig, SignupConfig};
pub use directory::InMemoryDirectory;
#[cfg(feature = "sqlite")]
pub use directory::SqliteDirectory;
pub use error::AuthError;
pub use extractors::CurrentUser;
pub use handlers::{auth_routes, EmailStartRequest, EmailVerifyRequest, EmailVerifyResponse};
pub use jwt::SessionCodec;
pub use mailer::LogMailer;
pub use policy::{LookupError, SignupPolicy};
pub use providers::{AppleProvider, GoogleProvider};
pub use state::{AuthState, AuthStores};
pub use stores::MemoryAuthStore;
#[cfg(feature = "redis")]
pub use stores::RedisAuthStore;
#[cfg(feature = "sqlite")]
pub use stores::SqliteAuthStore;

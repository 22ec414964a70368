//! OIDC provider implementations.
//!
//! This module contains implementations of `OidcProviderClient` for:
//! - Google
//! - Apple (with JWT client secret generation)

mod apple;
mod google;
mod oidc;
#[cfg(test)]
pub(crate) mod stub;

pub use apple::AppleProvider;
pub use google::GoogleProvider;

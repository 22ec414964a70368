//! Functional core for gatehouse.
//!
//! Pure types, functions and repository traits. Everything that performs
//! I/O lives in `gatehouse_auth`.

#[cfg(feature = "auth")]
pub mod auth;
pub mod directory;
pub mod signup;

//! Directory (users, memberships, invites) implementations.
//!
//! Provides the `gatehouse_core::directory` repository traits for:
//! - In-memory (always available)
//! - SQLite (with `sqlite` feature)

mod inmemory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use inmemory::InMemoryDirectory;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDirectory;

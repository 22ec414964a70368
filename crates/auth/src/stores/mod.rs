//! Storage for OIDC flow state and emailed sign-in codes.
//!
//! Provides `AuthFlowRepository` + `VerificationCodeRepository` for:
//! - In-memory (always available)
//! - SQLite (with `sqlite` feature)
//! - Redis (with `redis` feature)

mod inmemory;
#[cfg(feature = "redis")]
mod redis_impl;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use inmemory::MemoryAuthStore;
#[cfg(feature = "redis")]
pub use redis_impl::RedisAuthStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteAuthStore;

//! Builds the auth storage for the enabled backend features.
//!
//! - `sqlite`: directory and flow/code storage in one SQLite database
//! - `redis`: flow/code storage in Redis (takes precedence over SQLite for it)
//! - neither: everything in memory, lost on restart

use std::time::Duration;

use anyhow::Result;
use gatehouse_auth::AuthStores;

use crate::config::Config;

/// `code_ttl` bounds how long Redis keeps an unredeemed sign-in code.
#[cfg(not(feature = "sqlite"))]
#[cfg_attr(not(feature = "redis"), allow(unused_variables))]
pub async fn build_stores(config: &Config, code_ttl: Duration) -> Result<AuthStores> {
    use gatehouse_auth::{InMemoryDirectory, MemoryAuthStore};

    tracing::warn!(
        ?config,
        "no storage backend enabled, users and invites live in memory"
    );
    #[allow(unused_mut)]
    let mut stores = AuthStores::in_memory(MemoryAuthStore::new(), InMemoryDirectory::new());

    #[cfg(feature = "redis")]
    {
        let store = std::sync::Arc::new(redis_store(config, code_ttl).await?);
        stores.flows = store.clone();
        stores.codes = store;
    }

    Ok(stores)
}

#[cfg(feature = "sqlite")]
#[cfg_attr(not(feature = "redis"), allow(unused_variables))]
pub async fn build_stores(config: &Config, code_ttl: Duration) -> Result<AuthStores> {
    use std::sync::Arc;

    use gatehouse_auth::{SqliteAuthStore, SqliteDirectory};
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};

    let options = SqliteConnectOptions::new()
        .filename(&config.sqlite_path)
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;

    let directory = SqliteDirectory::new(pool.clone());
    directory.migrate().await?;
    let directory = Arc::new(directory);

    let store = SqliteAuthStore::new(pool);
    store.migrate().await?;
    let store = Arc::new(store);

    tracing::info!(path = %config.sqlite_path, "using SQLite storage");

    #[allow(unused_mut)]
    let mut stores = AuthStores {
        flows: store.clone(),
        codes: store,
        users: directory.clone(),
        memberships: directory.clone(),
        invites: directory,
    };

    #[cfg(feature = "redis")]
    {
        let store = Arc::new(redis_store(config, code_ttl).await?);
        stores.flows = store.clone();
        stores.codes = store;
    }

    Ok(stores)
}

#[cfg(feature = "redis")]
async fn redis_store(
    config: &Config,
    code_ttl: Duration,
) -> Result<gatehouse_auth::RedisAuthStore> {
    use fred::prelude::*;

    let redis_config = fred::prelude::Config::from_url(&config.redis_url)?;
    let pool = Builder::from_config(redis_config).build_pool(4)?;
    pool.init().await?;

    tracing::info!(url = %config.redis_url, "using Redis for sign-in flows and codes");

    Ok(gatehouse_auth::RedisAuthStore::new(pool, code_ttl))
}

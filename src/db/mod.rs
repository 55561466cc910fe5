//! Data store connection.
//!
//! The lifecycle only needs one thing from the data store: a single
//! asynchronous `connect` that either yields a usable handle or fails.
//! Reconnection and query execution are not this module's concern; route
//! groups run their own queries against [`Database::pool`].

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::config::DatabaseConfig;

pub mod schema;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("invalid database url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to apply schema: {0}")]
    Schema(#[source] sqlx::Error),

    #[error(transparent)]
    Query(#[from] sqlx::Error),
}

/// Handle to a connected data store.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Establishes the data store connection at startup.
#[async_trait]
pub trait DataStoreConnector: Send + Sync {
    /// Human-readable target for logs. Must not contain credentials.
    fn target(&self) -> String;

    /// Attempt to connect once. Implementations must not retry.
    async fn connect(&self) -> Result<Database, DbError>;
}

/// SQLite connector backed by a sqlx pool.
#[derive(Debug, Clone)]
pub struct SqlConnector {
    config: DatabaseConfig,
}

impl SqlConnector {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    fn is_in_memory(&self) -> bool {
        self.config.url.contains(":memory:") || self.config.url.contains("mode=memory")
    }
}

#[async_trait]
impl DataStoreConnector for SqlConnector {
    fn target(&self) -> String {
        redact(&self.config.url)
    }

    async fn connect(&self) -> Result<Database, DbError> {
        let url = &self.config.url;
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|source| DbError::InvalidUrl {
                url: redact(url),
                source,
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(self.config.max_connections)
            .acquire_timeout(Duration::from_secs(self.config.acquire_timeout_secs));

        // An in-memory database lives only as long as one of its connections.
        if self.is_in_memory() {
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|source| DbError::Connect {
                url: redact(url),
                source,
            })?;

        schema::apply(&pool).await.map_err(DbError::Schema)?;

        Ok(Database::new(pool))
    }
}

/// Strip any `user:password@` section from a connection URL.
pub fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &url[..scheme_end], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}

//! Database connection pool abstraction
//!
//! Repositories talk to a `DynDatabasePool` and never to a concrete backend.
//! Which backend sits behind it (SQLite or MySQL) is decided once, from the
//! `database` section of the configuration.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    mysql::{MySqlPool, MySqlPoolOptions},
    sqlite::{SqlitePool, SqlitePoolOptions},
};
use std::sync::Arc;

use crate::config::{DatabaseConfig, DatabaseDriver};

/// Backend-neutral handle over a sqlx connection pool.
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Run a statement and return the affected row count
    async fn execute(&self, query: &str) -> Result<u64>;

    /// `SELECT 1` round trip, used by the health endpoint
    async fn ping(&self) -> Result<()>;

    /// Wait for open connections to finish and refuse new ones
    async fn close(&self);

    fn driver(&self) -> DatabaseDriver;

    fn as_sqlite(&self) -> Option<&SqlitePool>;

    fn as_mysql(&self) -> Option<&MySqlPool>;
}

/// SQLite file or in-memory database
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Open (and create if missing) a SQLite database.
    ///
    /// Accepts a bare file path, a `sqlite:` URL or `:memory:`.
    pub async fn new(url: &str) -> Result<Self> {
        let is_memory = is_memory_url(url);
        if !is_memory {
            let path = url.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
            let path = path.split('?').next().unwrap_or(path);
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create database directory: {:?}", parent)
                    })?;
                }
            }
        }

        let connection_url = sqlite_connection_url(url);

        // Every connection of an in-memory pool shares one database, which
        // disappears once the last connection closes. Keep one open.
        let options = if is_memory {
            SqlitePoolOptions::new()
                .max_connections(5)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(20)
        };

        let pool = options
            .connect(&connection_url)
            .await
            .with_context(|| format!("Failed to connect to SQLite database: {}", url))?;

        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await
            .context("Failed to enable foreign keys")?;

        Ok(Self { pool })
    }
}

fn is_memory_url(url: &str) -> bool {
    url == ":memory:" || url.starts_with("sqlite::memory:")
}

/// Normalize a configured SQLite location into a sqlx connection URL.
fn sqlite_connection_url(url: &str) -> String {
    if url == ":memory:" {
        "sqlite::memory:".to_string()
    } else if url.starts_with("sqlite:") {
        if url.contains('?') || is_memory_url(url) {
            url.to_string()
        } else {
            format!("{}?mode=rwc", url)
        }
    } else {
        format!("sqlite:{}?mode=rwc", url)
    }
}

/// MySQL server connection
pub struct MysqlDatabase {
    pool: MySqlPool,
}

impl MysqlDatabase {
    /// Connect to a MySQL server. The `mysql://` scheme is optional.
    pub async fn new(url: &str) -> Result<Self> {
        let connection_url = if url.starts_with("mysql://") {
            url.to_string()
        } else {
            format!("mysql://{}", url)
        };

        let pool = MySqlPoolOptions::new()
            .max_connections(30)
            .connect(&connection_url)
            .await
            .with_context(|| format!("Failed to connect to MySQL database: {}", url))?;

        Ok(Self { pool })
    }
}

/// `DatabasePool` for a wrapper holding a `pool` field of the given sqlx pool
/// type. `$sqlite` and `$mysql` pick which accessor hands the pool out.
macro_rules! impl_database_pool {
    ($ty:ty, $driver:expr, sqlite: $sqlite:expr, mysql: $mysql:expr) => {
        #[async_trait]
        impl DatabasePool for $ty {
            async fn execute(&self, query: &str) -> Result<u64> {
                let done = sqlx::query(query)
                    .execute(&self.pool)
                    .await
                    .with_context(|| format!("Failed to execute query: {}", query))?;
                Ok(done.rows_affected())
            }

            async fn ping(&self) -> Result<()> {
                sqlx::query("SELECT 1")
                    .execute(&self.pool)
                    .await
                    .map(|_| ())
                    .with_context(|| format!("{:?} ping failed", $driver))
            }

            async fn close(&self) {
                self.pool.close().await;
            }

            fn driver(&self) -> DatabaseDriver {
                $driver
            }

            fn as_sqlite(&self) -> Option<&SqlitePool> {
                let pick: fn(&Self) -> Option<&SqlitePool> = $sqlite;
                pick(self)
            }

            fn as_mysql(&self) -> Option<&MySqlPool> {
                let pick: fn(&Self) -> Option<&MySqlPool> = $mysql;
                pick(self)
            }
        }
    };
}

impl_database_pool!(
    SqliteDatabase,
    DatabaseDriver::Sqlite,
    sqlite: |db| Some(&db.pool),
    mysql: |_| None
);
impl_database_pool!(
    MysqlDatabase,
    DatabaseDriver::Mysql,
    sqlite: |_| None,
    mysql: |db| Some(&db.pool)
);

/// Shared pool handle passed to every repository
pub type DynDatabasePool = Arc<dyn DatabasePool>;

/// Open the pool selected by `config.driver`.
pub async fn create_pool(config: &DatabaseConfig) -> Result<DynDatabasePool> {
    let pool: DynDatabasePool = match config.driver {
        DatabaseDriver::Sqlite => Arc::new(SqliteDatabase::new(&config.url).await?),
        DatabaseDriver::Mysql => Arc::new(MysqlDatabase::new(&config.url).await?),
    };
    tracing::info!("Connected to {:?} database", config.driver);
    Ok(pool)
}

/// Fresh in-memory SQLite pool, used by unit and integration tests.
pub async fn create_test_pool() -> Result<DynDatabasePool> {
    let config = DatabaseConfig {
        driver: DatabaseDriver::Sqlite,
        url: ":memory:".to_string(),
    };
    create_pool(&config).await
}

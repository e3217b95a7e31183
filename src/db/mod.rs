//! Database layer
//!
//! Storage for the wellbeing hub. Two backends are supported:
//! - SQLite (default, single-file deployment)
//! - MySQL
//!
//! The driver is selected from configuration. Repositories receive a
//! `DynDatabasePool` and run the same SQL against whichever backend is behind
//! it; only the migrations carry per-backend DDL.
//!
//! ```ignore
//! let pool = create_pool(&config.database).await?;
//! migrations::run_migrations(&pool).await?;
//! let users = SqlxUserRepository::boxed(pool.clone());
//! ```

/// Run `$body` with `$pool` bound to whichever concrete sqlx pool backs `$db`.
///
/// The body is expanded once per backend, so it must be valid for both
/// `&SqlitePool` and `&MySqlPool` and evaluate to an `anyhow::Result`.
macro_rules! with_pool {
    ($db:expr, |$pool:ident| $body:expr) => {{
        let db = &$db;
        if let Some($pool) = db.as_sqlite() {
            $body
        } else if let Some($pool) = db.as_mysql() {
            $body
        } else {
            Err(anyhow::anyhow!(
                "No connection available for the {:?} driver",
                db.driver()
            ))
        }
    }};
}

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};

/// Escape `%`, `_` and the escape character itself for `LIKE ? ESCAPE '!'`.
///
/// `!` is used because a backslash literal is spelled differently in SQLite
/// and MySQL.
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '!') {
            escaped.push('!');
        }
        escaped.push(c);
    }
    escaped
}

/// `%term%` with the term escaped
pub fn like_pattern(term: &str) -> String {
    format!("%{}%", escape_like(term))
}

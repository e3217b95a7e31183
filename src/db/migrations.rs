//! Embedded schema migrations
//!
//! Every table is created by a versioned migration compiled into the binary.
//! Each `Migration` carries one SQL script per backend; scripts may contain
//! several statements separated by `;`. Applied versions are recorded in the
//! `_migrations` table so `run_migrations` is safe to call on every start.

use anyhow::{Context, Result};
use sqlx::Row;

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id VARCHAR(36) PRIMARY KEY,
                name VARCHAR(255),
                email VARCHAR(255) NOT NULL UNIQUE,
                email_verified TIMESTAMP,
                image TEXT,
                role VARCHAR(20) NOT NULL DEFAULT 'staff',
                created_at TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_users_created_at ON users(created_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id VARCHAR(36) PRIMARY KEY,
                name VARCHAR(255),
                email VARCHAR(255) NOT NULL UNIQUE,
                email_verified DATETIME(6),
                image TEXT,
                role VARCHAR(20) NOT NULL DEFAULT 'staff',
                created_at DATETIME(6) NOT NULL
            );
            CREATE INDEX idx_users_created_at ON users(created_at);
        "#,
    },
    Migration {
        version: 2,
        name: "create_sessions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(36) PRIMARY KEY,
                session_token VARCHAR(128) NOT NULL UNIQUE,
                user_id VARCHAR(36) NOT NULL,
                expires TIMESTAMP NOT NULL,
                ip_address VARCHAR(64),
                user_agent TEXT,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(36) PRIMARY KEY,
                session_token VARCHAR(128) NOT NULL UNIQUE,
                user_id VARCHAR(36) NOT NULL,
                expires DATETIME(6) NOT NULL,
                ip_address VARCHAR(64),
                user_agent TEXT,
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX idx_sessions_expires ON sessions(expires);
        "#,
    },
    Migration {
        version: 3,
        name: "create_verification_tokens",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS verification_tokens (
                id VARCHAR(36) PRIMARY KEY,
                identifier VARCHAR(255) NOT NULL,
                value VARCHAR(64) NOT NULL UNIQUE,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_verification_identifier ON verification_tokens(identifier);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS verification_tokens (
                id VARCHAR(36) PRIMARY KEY,
                identifier VARCHAR(255) NOT NULL,
                value VARCHAR(64) NOT NULL UNIQUE,
                expires_at DATETIME(6) NOT NULL,
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL
            );
            CREATE INDEX idx_verification_identifier ON verification_tokens(identifier);
        "#,
    },
    Migration {
        version: 4,
        name: "create_announcements",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS announcements (
                id VARCHAR(36) PRIMARY KEY,
                title VARCHAR(255) NOT NULL,
                content TEXT NOT NULL,
                author_id VARCHAR(36),
                is_public BOOLEAN NOT NULL DEFAULT 0,
                published BOOLEAN NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_announcements_created_at ON announcements(created_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS announcements (
                id VARCHAR(36) PRIMARY KEY,
                title VARCHAR(255) NOT NULL,
                content TEXT NOT NULL,
                author_id VARCHAR(36),
                is_public BOOLEAN NOT NULL DEFAULT FALSE,
                published BOOLEAN NOT NULL DEFAULT TRUE,
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE INDEX idx_announcements_created_at ON announcements(created_at);
        "#,
    },
    Migration {
        version: 5,
        name: "create_news",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS news (
                id VARCHAR(36) PRIMARY KEY,
                title VARCHAR(255) NOT NULL,
                slug VARCHAR(255) NOT NULL UNIQUE,
                content TEXT NOT NULL,
                excerpt TEXT,
                author_id VARCHAR(36),
                published BOOLEAN NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_news_published ON news(published, created_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS news (
                id VARCHAR(36) PRIMARY KEY,
                title VARCHAR(255) NOT NULL,
                slug VARCHAR(255) NOT NULL UNIQUE,
                content MEDIUMTEXT NOT NULL,
                excerpt TEXT,
                author_id VARCHAR(36),
                published BOOLEAN NOT NULL DEFAULT FALSE,
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE INDEX idx_news_published ON news(published, created_at);
        "#,
    },
    Migration {
        version: 6,
        name: "create_policies",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS policies (
                id VARCHAR(36) PRIMARY KEY,
                title VARCHAR(255) NOT NULL,
                slug VARCHAR(255) NOT NULL UNIQUE,
                description TEXT,
                category VARCHAR(64) NOT NULL,
                file_url TEXT,
                published BOOLEAN NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_policies_category ON policies(category);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS policies (
                id VARCHAR(36) PRIMARY KEY,
                title VARCHAR(255) NOT NULL,
                slug VARCHAR(255) NOT NULL UNIQUE,
                description TEXT,
                category VARCHAR(64) NOT NULL,
                file_url TEXT,
                published BOOLEAN NOT NULL DEFAULT TRUE,
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL
            );
            CREATE INDEX idx_policies_category ON policies(category);
        "#,
    },
    Migration {
        version: 7,
        name: "create_events",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS events (
                id VARCHAR(36) PRIMARY KEY,
                title VARCHAR(255) NOT NULL,
                description TEXT,
                location VARCHAR(255),
                start_date TIMESTAMP NOT NULL,
                end_date TIMESTAMP,
                published BOOLEAN NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_events_start_date ON events(start_date);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS events (
                id VARCHAR(36) PRIMARY KEY,
                title VARCHAR(255) NOT NULL,
                description TEXT,
                location VARCHAR(255),
                start_date DATETIME(6) NOT NULL,
                end_date DATETIME(6),
                published BOOLEAN NOT NULL DEFAULT TRUE,
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL
            );
            CREATE INDEX idx_events_start_date ON events(start_date);
        "#,
    },
    Migration {
        version: 8,
        name: "create_submissions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS submissions (
                id VARCHAR(36) PRIMARY KEY,
                type VARCHAR(20) NOT NULL,
                title VARCHAR(255) NOT NULL,
                content TEXT NOT NULL,
                author_id VARCHAR(36) NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                reviewed_by VARCHAR(36),
                review_note TEXT,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (reviewed_by) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_submissions_author ON submissions(author_id);
            CREATE INDEX IF NOT EXISTS idx_submissions_status ON submissions(status);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS submissions (
                id VARCHAR(36) PRIMARY KEY,
                type VARCHAR(20) NOT NULL,
                title VARCHAR(255) NOT NULL,
                content MEDIUMTEXT NOT NULL,
                author_id VARCHAR(36) NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                reviewed_by VARCHAR(36),
                review_note TEXT,
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (reviewed_by) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE INDEX idx_submissions_author ON submissions(author_id);
            CREATE INDEX idx_submissions_status ON submissions(status);
        "#,
    },
    Migration {
        version: 9,
        name: "create_downloads",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS downloads (
                id VARCHAR(36) PRIMARY KEY,
                title VARCHAR(255) NOT NULL,
                description TEXT,
                category VARCHAR(64) NOT NULL,
                file_url TEXT NOT NULL,
                file_name VARCHAR(255) NOT NULL,
                file_size BIGINT,
                published BOOLEAN NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_downloads_category ON downloads(category);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS downloads (
                id VARCHAR(36) PRIMARY KEY,
                title VARCHAR(255) NOT NULL,
                description TEXT,
                category VARCHAR(64) NOT NULL,
                file_url TEXT NOT NULL,
                file_name VARCHAR(255) NOT NULL,
                file_size BIGINT,
                published BOOLEAN NOT NULL DEFAULT TRUE,
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL
            );
            CREATE INDEX idx_downloads_category ON downloads(category);
        "#,
    },
];

/// Apply all pending migrations in version order.
///
/// Returns the number of migrations applied by this call.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i64> = applied.iter().map(|m| m.version).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&(migration.version as i64)) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

/// Create the migrations tracking table if it doesn't exist
async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version BIGINT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

/// Get list of already applied migrations
async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    with_pool!(pool, |db| {
        let rows = sqlx::query("SELECT version, name FROM _migrations ORDER BY version")
            .fetch_all(db)
            .await
            .context("Failed to read applied migrations")?;

        rows.iter()
            .map(|row| -> Result<MigrationRecord> {
                Ok(MigrationRecord {
                    version: row.try_get::<i64, _>("version")?,
                    name: row.try_get("name")?,
                })
            })
            .collect::<Result<Vec<_>>>()
    })
}

/// Apply a single migration and record it
async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    let script = match pool.driver() {
        DatabaseDriver::Sqlite => migration.up_sqlite,
        DatabaseDriver::Mysql => migration.up_mysql,
    };

    for statement in split_sql_statements(script) {
        pool.execute(statement)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    with_pool!(pool, |db| {
        sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
            .bind(migration.version)
            .bind(migration.name)
            .execute(db)
            .await
            .map(|_| ())
            .context("Failed to record migration")
    })
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual statements, handling comments properly
fn split_sql_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut current_start = 0;
    let mut in_statement = false;

    for (i, c) in sql.char_indices() {
        match c {
            ';' => {
                if in_statement {
                    let stmt = sql[current_start..i].trim();
                    if !stmt.is_empty() && !is_comment_only(stmt) {
                        statements.push(stmt);
                    }
                    in_statement = false;
                }
                current_start = i + 1;
            }
            _ if !c.is_whitespace() && !in_statement => {
                current_start = i;
                in_statement = true;
            }
            _ => {}
        }
    }

    // Handle last statement without trailing semicolon
    if in_statement {
        let stmt = sql[current_start..].trim();
        if !stmt.is_empty() && !is_comment_only(stmt) {
            statements.push(stmt);
        }
    }

    statements
}

/// Check if a string contains only SQL comments
fn is_comment_only(s: &str) -> bool {
    for line in s.lines() {
        let trimmed = line.trim();
        if !trimmed.is_empty() && !trimmed.starts_with("--") {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    async fn migrated_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        pool
    }

    async fn insert_user(pool: &DynDatabasePool, id: &str, email: &str) {
        sqlx::query("INSERT INTO users (id, email, role, created_at) VALUES (?, ?, 'staff', ?)")
            .bind(id)
            .bind(email)
            .bind(chrono::Utc::now())
            .execute(pool.as_sqlite().unwrap())
            .await
            .expect("Failed to insert user");
    }

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, MIGRATIONS.len());

        // Running again should apply 0 migrations
        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_all_tables_created() {
        let pool = migrated_pool().await;

        for table in [
            "users",
            "sessions",
            "verification_tokens",
            "announcements",
            "news",
            "policies",
            "events",
            "submissions",
            "downloads",
        ] {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(pool.as_sqlite().unwrap())
                .await
                .unwrap_or_else(|e| panic!("table {} missing: {}", table, e));
            assert_eq!(count, 0);
        }
    }

    #[tokio::test]
    async fn test_user_email_unique() {
        let pool = migrated_pool().await;
        insert_user(&pool, "u1", "a@4wdc.com.au").await;

        let result =
            sqlx::query("INSERT INTO users (id, email, role, created_at) VALUES (?, ?, 'staff', ?)")
                .bind("u2")
                .bind("a@4wdc.com.au")
                .bind(chrono::Utc::now())
                .execute(pool.as_sqlite().unwrap())
                .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_session_requires_existing_user() {
        let pool = migrated_pool().await;
        let now = chrono::Utc::now();

        let result = sqlx::query(
            "INSERT INTO sessions (id, session_token, user_id, expires, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind("s1")
        .bind("token")
        .bind("missing-user")
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(pool.as_sqlite().unwrap())
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_deleting_user_cascades_sessions() {
        let pool = migrated_pool().await;
        let sqlite = pool.as_sqlite().unwrap();
        let now = chrono::Utc::now();
        insert_user(&pool, "u1", "a@4wdc.com.au").await;

        sqlx::query(
            "INSERT INTO sessions (id, session_token, user_id, expires, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind("s1")
        .bind("token")
        .bind("u1")
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(sqlite)
        .await
        .expect("Failed to insert session");

        sqlx::query("DELETE FROM users WHERE id = 'u1'")
            .execute(sqlite)
            .await
            .expect("Failed to delete user");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(sqlite)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_news_slug_unique() {
        let pool = migrated_pool().await;
        let sqlite = pool.as_sqlite().unwrap();
        let now = chrono::Utc::now();

        for (id, expect_ok) in [("n1", true), ("n2", false)] {
            let result = sqlx::query(
                "INSERT INTO news (id, title, slug, content, created_at, updated_at) VALUES (?, 'T', 'same-slug', 'C', ?, ?)",
            )
            .bind(id)
            .bind(now)
            .bind(now)
            .execute(sqlite)
            .await;
            assert_eq!(result.is_ok(), expect_ok);
        }
    }

    #[test]
    fn test_migration_versions_sequential() {
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version as usize, i + 1);
        }
        assert_eq!(MIGRATIONS.len(), 9);
    }

    #[test]
    fn test_split_sql_statements() {
        let sql = "CREATE TABLE a (id INT); CREATE TABLE b (id INT);";
        let statements = split_sql_statements(sql);
        assert_eq!(statements.len(), 2);

        let sql_with_comments = "-- Comment\nCREATE TABLE a (id INT);";
        let statements = split_sql_statements(sql_with_comments);
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn test_is_comment_only() {
        assert!(is_comment_only("-- This is a comment"));
        assert!(is_comment_only("-- Line 1\n-- Line 2"));
        assert!(!is_comment_only("CREATE TABLE test"));
        assert!(!is_comment_only("-- Comment\nCREATE TABLE test"));
    }
}

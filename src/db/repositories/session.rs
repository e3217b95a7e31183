//! Session repository
//!
//! Database operations for browser sessions. Sessions are looked up by the
//! opaque token stored in the `session` cookie.

use crate::db::DynDatabasePool;
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const SESSION_COLUMNS: &str =
    "id, session_token, user_id, expires, ip_address, user_agent, created_at, updated_at";

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Create a new session
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Get session by its cookie token
    async fn get_by_token(&self, token: &str) -> Result<Option<Session>>;

    /// Delete a session
    async fn delete_by_token(&self, token: &str) -> Result<()>;

    /// Delete all sessions for a user
    async fn delete_by_user(&self, user_id: &str) -> Result<()>;

    /// Delete expired sessions, returning how many were removed
    async fn delete_expired(&self) -> Result<u64>;
}

/// SQLx-based session repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    /// Create a new SQLx session repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        with_pool!(self.pool, |db| {
            sqlx::query(
                r#"
                INSERT INTO sessions (id, session_token, user_id, expires, ip_address, user_agent, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&session.id)
            .bind(&session.session_token)
            .bind(&session.user_id)
            .bind(session.expires)
            .bind(&session.ip_address)
            .bind(&session.user_agent)
            .bind(session.created_at)
            .bind(session.updated_at)
            .execute(db)
            .await
            .map(|_| ())
            .context("Failed to create session")
        })?;

        Ok(session.clone())
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<Session>> {
        let sql = format!("SELECT {} FROM sessions WHERE session_token = ?", SESSION_COLUMNS);
        with_pool!(self.pool, |db| {
            sqlx::query_as::<_, Session>(&sql)
                .bind(token)
                .fetch_optional(db)
                .await
                .context("Failed to get session by token")
        })
    }

    async fn delete_by_token(&self, token: &str) -> Result<()> {
        with_pool!(self.pool, |db| {
            sqlx::query("DELETE FROM sessions WHERE session_token = ?")
                .bind(token)
                .execute(db)
                .await
                .map(|_| ())
                .context("Failed to delete session")
        })
    }

    async fn delete_by_user(&self, user_id: &str) -> Result<()> {
        with_pool!(self.pool, |db| {
            sqlx::query("DELETE FROM sessions WHERE user_id = ?")
                .bind(user_id)
                .execute(db)
                .await
                .map(|_| ())
                .context("Failed to delete sessions by user")
        })
    }

    async fn delete_expired(&self) -> Result<u64> {
        let now = Utc::now();
        with_pool!(self.pool, |db| {
            sqlx::query("DELETE FROM sessions WHERE expires < ?")
                .bind(now)
                .execute(db)
                .await
                .map(|r| r.rows_affected())
                .context("Failed to delete expired sessions")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};
    use crate::models::new_id;
    use chrono::Duration;

    fn create_test_session(user_id: &str, expires_in_days: i64) -> Session {
        let now = Utc::now();
        Session {
            id: new_id(),
            session_token: new_id(),
            user_id: user_id.to_string(),
            expires: now + Duration::days(expires_in_days),
            ip_address: Some("10.0.0.1".to_string()),
            user_agent: Some("test-agent".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let pool = setup_pool().await;
        let user = insert_user(&pool, "a@4wdc.com.au").await;
        let repo = SqlxSessionRepository::new(pool);

        let session = create_test_session(&user.id, 7);
        repo.create(&session).await.expect("Failed to create session");

        let found = repo
            .get_by_token(&session.session_token)
            .await
            .unwrap()
            .expect("session should exist");
        assert_eq!(found.user_id, user.id);
        assert_eq!(found.ip_address.as_deref(), Some("10.0.0.1"));
        assert!(!found.is_expired());

        assert!(repo.get_by_token("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_by_token_and_user() {
        let pool = setup_pool().await;
        let user = insert_user(&pool, "a@4wdc.com.au").await;
        let repo = SqlxSessionRepository::new(pool);

        let first = create_test_session(&user.id, 7);
        let second = create_test_session(&user.id, 7);
        repo.create(&first).await.unwrap();
        repo.create(&second).await.unwrap();

        repo.delete_by_token(&first.session_token).await.unwrap();
        assert!(repo.get_by_token(&first.session_token).await.unwrap().is_none());
        assert!(repo.get_by_token(&second.session_token).await.unwrap().is_some());

        repo.delete_by_user(&user.id).await.unwrap();
        assert!(repo.get_by_token(&second.session_token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let pool = setup_pool().await;
        let user = insert_user(&pool, "a@4wdc.com.au").await;
        let repo = SqlxSessionRepository::new(pool);

        let live = create_test_session(&user.id, 7);
        let stale = create_test_session(&user.id, -1);
        repo.create(&live).await.unwrap();
        repo.create(&stale).await.unwrap();

        assert_eq!(repo.delete_expired().await.unwrap(), 1);
        assert!(repo.get_by_token(&live.session_token).await.unwrap().is_some());
        assert!(repo.get_by_token(&stale.session_token).await.unwrap().is_none());
    }
}

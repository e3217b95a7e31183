//! Verification token repository
//!
//! Pending magic-link sign-ins. Only the digest of each token is stored.

use crate::db::DynDatabasePool;
use crate::models::VerificationToken;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const TOKEN_COLUMNS: &str = "id, identifier, value, expires_at, created_at, updated_at";

#[async_trait]
pub trait VerificationRepository: Send + Sync {
    /// Store a token, dropping any earlier one for the same identifier
    async fn replace(&self, token: &VerificationToken) -> Result<()>;

    /// Remove and return the token with the given digest (single use)
    async fn take(&self, value: &str) -> Result<Option<VerificationToken>>;

    /// Delete expired tokens, returning how many were removed
    async fn delete_expired(&self) -> Result<u64>;
}

pub struct SqlxVerificationRepository {
    pool: DynDatabasePool,
}

impl SqlxVerificationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn VerificationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl VerificationRepository for SqlxVerificationRepository {
    async fn replace(&self, token: &VerificationToken) -> Result<()> {
        with_pool!(self.pool, |db| {
            sqlx::query("DELETE FROM verification_tokens WHERE identifier = ?")
                .bind(&token.identifier)
                .execute(db)
                .await
                .map(|_| ())
                .context("Failed to clear previous verification tokens")
        })?;

        with_pool!(self.pool, |db| {
            sqlx::query(
                r#"
                INSERT INTO verification_tokens (id, identifier, value, expires_at, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&token.id)
            .bind(&token.identifier)
            .bind(&token.value)
            .bind(token.expires_at)
            .bind(token.created_at)
            .bind(token.updated_at)
            .execute(db)
            .await
            .map(|_| ())
            .context("Failed to store verification token")
        })
    }

    async fn take(&self, value: &str) -> Result<Option<VerificationToken>> {
        let sql = format!(
            "SELECT {} FROM verification_tokens WHERE value = ?",
            TOKEN_COLUMNS
        );
        let token = with_pool!(self.pool, |db| {
            sqlx::query_as::<_, VerificationToken>(&sql)
                .bind(value)
                .fetch_optional(db)
                .await
                .context("Failed to look up verification token")
        })?;

        let Some(token) = token else {
            return Ok(None);
        };

        // A concurrent verification may have consumed it first
        let deleted = with_pool!(self.pool, |db| {
            sqlx::query("DELETE FROM verification_tokens WHERE id = ?")
                .bind(&token.id)
                .execute(db)
                .await
                .map(|r| r.rows_affected())
                .context("Failed to consume verification token")
        })?;

        Ok((deleted > 0).then_some(token))
    }

    async fn delete_expired(&self) -> Result<u64> {
        let now = Utc::now();
        with_pool!(self.pool, |db| {
            sqlx::query("DELETE FROM verification_tokens WHERE expires_at < ?")
                .bind(now)
                .execute(db)
                .await
                .map(|r| r.rows_affected())
                .context("Failed to delete expired verification tokens")
        })
    }
}

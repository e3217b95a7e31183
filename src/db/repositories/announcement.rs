//! Announcement repository

use crate::db::DynDatabasePool;
use crate::models::Announcement;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

const ANNOUNCEMENT_COLUMNS: &str =
    "id, title, content, author_id, is_public, published, created_at, updated_at";

#[async_trait]
pub trait AnnouncementRepository: Send + Sync {
    async fn create(&self, announcement: &Announcement) -> Result<Announcement>;

    /// Returns false when the row does not exist
    async fn update(&self, announcement: &Announcement) -> Result<bool>;

    /// Returns false when the row does not exist
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Announcement>>;

    /// Every announcement, newest first
    async fn list_all(&self) -> Result<Vec<Announcement>>;

    /// Published announcements, newest first. With `public_only`, only those
    /// visible to anonymous visitors.
    async fn list_published(&self, public_only: bool, limit: Option<i64>)
        -> Result<Vec<Announcement>>;
}

pub struct SqlxAnnouncementRepository {
    pool: DynDatabasePool,
}

impl SqlxAnnouncementRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AnnouncementRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AnnouncementRepository for SqlxAnnouncementRepository {
    async fn create(&self, announcement: &Announcement) -> Result<Announcement> {
        with_pool!(self.pool, |db| {
            sqlx::query(
                r#"
                INSERT INTO announcements (id, title, content, author_id, is_public, published, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&announcement.id)
            .bind(&announcement.title)
            .bind(&announcement.content)
            .bind(&announcement.author_id)
            .bind(announcement.is_public)
            .bind(announcement.published)
            .bind(announcement.created_at)
            .bind(announcement.updated_at)
            .execute(db)
            .await
            .map(|_| ())
            .context("Failed to create announcement")
        })?;

        Ok(announcement.clone())
    }

    async fn update(&self, announcement: &Announcement) -> Result<bool> {
        let affected = with_pool!(self.pool, |db| {
            sqlx::query(
                r#"
                UPDATE announcements
                SET title = ?, content = ?, is_public = ?, published = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&announcement.title)
            .bind(&announcement.content)
            .bind(announcement.is_public)
            .bind(announcement.published)
            .bind(announcement.updated_at)
            .bind(&announcement.id)
            .execute(db)
            .await
            .map(|r| r.rows_affected())
            .context("Failed to update announcement")
        })?;
        Ok(affected > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let affected = with_pool!(self.pool, |db| {
            sqlx::query("DELETE FROM announcements WHERE id = ?")
                .bind(id)
                .execute(db)
                .await
                .map(|r| r.rows_affected())
                .context("Failed to delete announcement")
        })?;
        Ok(affected > 0)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Announcement>> {
        let sql = format!("SELECT {} FROM announcements WHERE id = ?", ANNOUNCEMENT_COLUMNS);
        with_pool!(self.pool, |db| {
            sqlx::query_as::<_, Announcement>(&sql)
                .bind(id)
                .fetch_optional(db)
                .await
                .context("Failed to get announcement")
        })
    }

    async fn list_all(&self) -> Result<Vec<Announcement>> {
        let sql = format!(
            "SELECT {} FROM announcements ORDER BY created_at DESC",
            ANNOUNCEMENT_COLUMNS
        );
        with_pool!(self.pool, |db| {
            sqlx::query_as::<_, Announcement>(&sql)
                .fetch_all(db)
                .await
                .context("Failed to list announcements")
        })
    }

    async fn list_published(
        &self,
        public_only: bool,
        limit: Option<i64>,
    ) -> Result<Vec<Announcement>> {
        let mut sql = format!(
            "SELECT {} FROM announcements WHERE published = ?",
            ANNOUNCEMENT_COLUMNS
        );
        if public_only {
            sql.push_str(" AND is_public = ?");
        }
        sql.push_str(" ORDER BY created_at DESC");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        with_pool!(self.pool, |db| {
            let mut query = sqlx::query_as::<_, Announcement>(&sql).bind(true);
            if public_only {
                query = query.bind(true);
            }
            query
                .fetch_all(db)
                .await
                .context("Failed to list published announcements")
        })
    }
}

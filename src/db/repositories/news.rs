//! News repository

use crate::db::{escape_like, DynDatabasePool};
use crate::models::News;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

const NEWS_COLUMNS: &str =
    "id, title, slug, content, excerpt, author_id, published, created_at, updated_at";

#[async_trait]
pub trait NewsRepository: Send + Sync {
    async fn create(&self, news: &News) -> Result<News>;

    /// Returns false when the row does not exist
    async fn update(&self, news: &News) -> Result<bool>;

    /// Returns false when the row does not exist
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn get_by_id(&self, id: &str) -> Result<Option<News>>;

    /// A published article by slug
    async fn get_published_by_slug(&self, slug: &str) -> Result<Option<News>>;

    /// Every article, newest first
    async fn list_all(&self) -> Result<Vec<News>>;

    /// Published articles, newest first
    async fn list_published(&self, limit: Option<i64>) -> Result<Vec<News>>;

    /// Slugs equal to `base` or of the form `base-…`, ignoring row `exclude_id`
    async fn find_slugs(&self, base: &str, exclude_id: Option<&str>) -> Result<Vec<String>>;

    /// Published articles whose title or content matches a LIKE pattern
    async fn search(&self, pattern: &str, limit: i64) -> Result<Vec<News>>;

    async fn count(&self) -> Result<i64>;
}

pub struct SqlxNewsRepository {
    pool: DynDatabasePool,
}

impl SqlxNewsRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NewsRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl NewsRepository for SqlxNewsRepository {
    async fn create(&self, news: &News) -> Result<News> {
        with_pool!(self.pool, |db| {
            sqlx::query(
                r#"
                INSERT INTO news (id, title, slug, content, excerpt, author_id, published, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&news.id)
            .bind(&news.title)
            .bind(&news.slug)
            .bind(&news.content)
            .bind(&news.excerpt)
            .bind(&news.author_id)
            .bind(news.published)
            .bind(news.created_at)
            .bind(news.updated_at)
            .execute(db)
            .await
            .map(|_| ())
            .context("Failed to create news article")
        })?;

        Ok(news.clone())
    }

    async fn update(&self, news: &News) -> Result<bool> {
        let affected = with_pool!(self.pool, |db| {
            sqlx::query(
                r#"
                UPDATE news
                SET title = ?, slug = ?, content = ?, excerpt = ?, published = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&news.title)
            .bind(&news.slug)
            .bind(&news.content)
            .bind(&news.excerpt)
            .bind(news.published)
            .bind(news.updated_at)
            .bind(&news.id)
            .execute(db)
            .await
            .map(|r| r.rows_affected())
            .context("Failed to update news article")
        })?;
        Ok(affected > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let affected = with_pool!(self.pool, |db| {
            sqlx::query("DELETE FROM news WHERE id = ?")
                .bind(id)
                .execute(db)
                .await
                .map(|r| r.rows_affected())
                .context("Failed to delete news article")
        })?;
        Ok(affected > 0)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<News>> {
        let sql = format!("SELECT {} FROM news WHERE id = ?", NEWS_COLUMNS);
        with_pool!(self.pool, |db| {
            sqlx::query_as::<_, News>(&sql)
                .bind(id)
                .fetch_optional(db)
                .await
                .context("Failed to get news article")
        })
    }

    async fn get_published_by_slug(&self, slug: &str) -> Result<Option<News>> {
        let sql = format!(
            "SELECT {} FROM news WHERE slug = ? AND published = ?",
            NEWS_COLUMNS
        );
        with_pool!(self.pool, |db| {
            sqlx::query_as::<_, News>(&sql)
                .bind(slug)
                .bind(true)
                .fetch_optional(db)
                .await
                .context("Failed to get news article by slug")
        })
    }

    async fn list_all(&self) -> Result<Vec<News>> {
        let sql = format!("SELECT {} FROM news ORDER BY created_at DESC", NEWS_COLUMNS);
        with_pool!(self.pool, |db| {
            sqlx::query_as::<_, News>(&sql)
                .fetch_all(db)
                .await
                .context("Failed to list news")
        })
    }

    async fn list_published(&self, limit: Option<i64>) -> Result<Vec<News>> {
        let mut sql = format!(
            "SELECT {} FROM news WHERE published = ? ORDER BY created_at DESC",
            NEWS_COLUMNS
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        with_pool!(self.pool, |db| {
            sqlx::query_as::<_, News>(&sql)
                .bind(true)
                .fetch_all(db)
                .await
                .context("Failed to list published news")
        })
    }

    async fn find_slugs(&self, base: &str, exclude_id: Option<&str>) -> Result<Vec<String>> {
        let prefix = format!("{}-%", escape_like(base));
        let exclude_id = exclude_id.unwrap_or("");
        with_pool!(self.pool, |db| {
            sqlx::query_scalar::<_, String>(
                "SELECT slug FROM news WHERE (slug = ? OR slug LIKE ? ESCAPE '!') AND id <> ?",
            )
            .bind(base)
            .bind(&prefix)
            .bind(exclude_id)
            .fetch_all(db)
            .await
            .context("Failed to look up news slugs")
        })
    }

    async fn search(&self, pattern: &str, limit: i64) -> Result<Vec<News>> {
        let sql = format!(
            r#"
            SELECT {} FROM news
            WHERE published = ? AND (title LIKE ? ESCAPE '!' OR content LIKE ? ESCAPE '!')
            ORDER BY created_at DESC
            LIMIT {}
            "#,
            NEWS_COLUMNS, limit
        );
        with_pool!(self.pool, |db| {
            sqlx::query_as::<_, News>(&sql)
                .bind(true)
                .bind(pattern)
                .bind(pattern)
                .fetch_all(db)
                .await
                .context("Failed to search news")
        })
    }

    async fn count(&self) -> Result<i64> {
        with_pool!(self.pool, |db| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM news")
                .fetch_one(db)
                .await
                .context("Failed to count news")
        })
    }
}

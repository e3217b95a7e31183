//! Event repository

use crate::db::DynDatabasePool;
use crate::models::Event;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

const EVENT_COLUMNS: &str =
    "id, title, description, location, start_date, end_date, published, created_at, updated_at";

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn create(&self, event: &Event) -> Result<Event>;

    /// Returns false when the row does not exist
    async fn update(&self, event: &Event) -> Result<bool>;

    /// Returns false when the row does not exist
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Event>>;

    /// Every event, latest start date first
    async fn list_all(&self) -> Result<Vec<Event>>;

    /// Published events, latest start date first
    async fn list_published(&self, limit: Option<i64>) -> Result<Vec<Event>>;

    /// Published events whose title or description matches a LIKE pattern
    async fn search(&self, pattern: &str, limit: i64) -> Result<Vec<Event>>;

    async fn count(&self) -> Result<i64>;
}

pub struct SqlxEventRepository {
    pool: DynDatabasePool,
}

impl SqlxEventRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn EventRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl EventRepository for SqlxEventRepository {
    async fn create(&self, event: &Event) -> Result<Event> {
        with_pool!(self.pool, |db| {
            sqlx::query(
                r#"
                INSERT INTO events (id, title, description, location, start_date, end_date, published, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&event.id)
            .bind(&event.title)
            .bind(&event.description)
            .bind(&event.location)
            .bind(event.start_date)
            .bind(event.end_date)
            .bind(event.published)
            .bind(event.created_at)
            .bind(event.updated_at)
            .execute(db)
            .await
            .map(|_| ())
            .context("Failed to create event")
        })?;

        Ok(event.clone())
    }

    async fn update(&self, event: &Event) -> Result<bool> {
        let affected = with_pool!(self.pool, |db| {
            sqlx::query(
                r#"
                UPDATE events
                SET title = ?, description = ?, location = ?, start_date = ?, end_date = ?, published = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&event.title)
            .bind(&event.description)
            .bind(&event.location)
            .bind(event.start_date)
            .bind(event.end_date)
            .bind(event.published)
            .bind(event.updated_at)
            .bind(&event.id)
            .execute(db)
            .await
            .map(|r| r.rows_affected())
            .context("Failed to update event")
        })?;
        Ok(affected > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let affected = with_pool!(self.pool, |db| {
            sqlx::query("DELETE FROM events WHERE id = ?")
                .bind(id)
                .execute(db)
                .await
                .map(|r| r.rows_affected())
                .context("Failed to delete event")
        })?;
        Ok(affected > 0)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Event>> {
        let sql = format!("SELECT {} FROM events WHERE id = ?", EVENT_COLUMNS);
        with_pool!(self.pool, |db| {
            sqlx::query_as::<_, Event>(&sql)
                .bind(id)
                .fetch_optional(db)
                .await
                .context("Failed to get event")
        })
    }

    async fn list_all(&self) -> Result<Vec<Event>> {
        let sql = format!("SELECT {} FROM events ORDER BY start_date DESC", EVENT_COLUMNS);
        with_pool!(self.pool, |db| {
            sqlx::query_as::<_, Event>(&sql)
                .fetch_all(db)
                .await
                .context("Failed to list events")
        })
    }

    async fn list_published(&self, limit: Option<i64>) -> Result<Vec<Event>> {
        let mut sql = format!(
            "SELECT {} FROM events WHERE published = ? ORDER BY start_date DESC",
            EVENT_COLUMNS
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        with_pool!(self.pool, |db| {
            sqlx::query_as::<_, Event>(&sql)
                .bind(true)
                .fetch_all(db)
                .await
                .context("Failed to list published events")
        })
    }

    async fn search(&self, pattern: &str, limit: i64) -> Result<Vec<Event>> {
        let sql = format!(
            r#"
            SELECT {} FROM events
            WHERE published = ? AND (title LIKE ? ESCAPE '!' OR description LIKE ? ESCAPE '!')
            ORDER BY start_date DESC
            LIMIT {}
            "#,
            EVENT_COLUMNS, limit
        );
        with_pool!(self.pool, |db| {
            sqlx::query_as::<_, Event>(&sql)
                .bind(true)
                .bind(pattern)
                .bind(pattern)
                .fetch_all(db)
                .await
                .context("Failed to search events")
        })
    }

    async fn count(&self) -> Result<i64> {
        with_pool!(self.pool, |db| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM events")
                .fetch_one(db)
                .await
                .context("Failed to count events")
        })
    }
}

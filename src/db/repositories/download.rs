//! Download repository

use crate::db::DynDatabasePool;
use crate::models::Download;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

const DOWNLOAD_COLUMNS: &str = "id, title, description, category, file_url, file_name, file_size, published, created_at, updated_at";

#[async_trait]
pub trait DownloadRepository: Send + Sync {
    async fn create(&self, download: &Download) -> Result<Download>;

    /// Returns false when the row does not exist
    async fn update(&self, download: &Download) -> Result<bool>;

    /// Returns false when the row does not exist
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Download>>;

    /// Every download, newest first
    async fn list_all(&self) -> Result<Vec<Download>>;

    /// Published downloads, newest first
    async fn list_published(&self) -> Result<Vec<Download>>;

    async fn count(&self) -> Result<i64>;
}

pub struct SqlxDownloadRepository {
    pool: DynDatabasePool,
}

impl SqlxDownloadRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn DownloadRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl DownloadRepository for SqlxDownloadRepository {
    async fn create(&self, download: &Download) -> Result<Download> {
        with_pool!(self.pool, |db| {
            sqlx::query(
                r#"
                INSERT INTO downloads (id, title, description, category, file_url, file_name, file_size, published, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&download.id)
            .bind(&download.title)
            .bind(&download.description)
            .bind(&download.category)
            .bind(&download.file_url)
            .bind(&download.file_name)
            .bind(download.file_size)
            .bind(download.published)
            .bind(download.created_at)
            .bind(download.updated_at)
            .execute(db)
            .await
            .map(|_| ())
            .context("Failed to create download")
        })?;

        Ok(download.clone())
    }

    async fn update(&self, download: &Download) -> Result<bool> {
        let affected = with_pool!(self.pool, |db| {
            sqlx::query(
                r#"
                UPDATE downloads
                SET title = ?, description = ?, category = ?, file_url = ?, file_name = ?, file_size = ?, published = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&download.title)
            .bind(&download.description)
            .bind(&download.category)
            .bind(&download.file_url)
            .bind(&download.file_name)
            .bind(download.file_size)
            .bind(download.published)
            .bind(download.updated_at)
            .bind(&download.id)
            .execute(db)
            .await
            .map(|r| r.rows_affected())
            .context("Failed to update download")
        })?;
        Ok(affected > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let affected = with_pool!(self.pool, |db| {
            sqlx::query("DELETE FROM downloads WHERE id = ?")
                .bind(id)
                .execute(db)
                .await
                .map(|r| r.rows_affected())
                .context("Failed to delete download")
        })?;
        Ok(affected > 0)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Download>> {
        let sql = format!("SELECT {} FROM downloads WHERE id = ?", DOWNLOAD_COLUMNS);
        with_pool!(self.pool, |db| {
            sqlx::query_as::<_, Download>(&sql)
                .bind(id)
                .fetch_optional(db)
                .await
                .context("Failed to get download")
        })
    }

    async fn list_all(&self) -> Result<Vec<Download>> {
        let sql = format!(
            "SELECT {} FROM downloads ORDER BY created_at DESC",
            DOWNLOAD_COLUMNS
        );
        with_pool!(self.pool, |db| {
            sqlx::query_as::<_, Download>(&sql)
                .fetch_all(db)
                .await
                .context("Failed to list downloads")
        })
    }

    async fn list_published(&self) -> Result<Vec<Download>> {
        let sql = format!(
            "SELECT {} FROM downloads WHERE published = ? ORDER BY created_at DESC",
            DOWNLOAD_COLUMNS
        );
        with_pool!(self.pool, |db| {
            sqlx::query_as::<_, Download>(&sql)
                .bind(true)
                .fetch_all(db)
                .await
                .context("Failed to list published downloads")
        })
    }

    async fn count(&self) -> Result<i64> {
        with_pool!(self.pool, |db| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM downloads")
                .fetch_one(db)
                .await
                .context("Failed to count downloads")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::setup_pool;
    use crate::models::new_id;
    use chrono::Utc;

    fn download(title: &str, published: bool) -> Download {
        let now = Utc::now();
        Download {
            id: new_id(),
            title: title.to_string(),
            description: None,
            category: "Forms".to_string(),
            file_url: format!("/uploads/downloads/1-{}.pdf", title),
            file_name: format!("{}.pdf", title),
            file_size: Some(1024),
            published,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_crud_and_listing() {
        let repo = SqlxDownloadRepository::new(setup_pool().await);
        let mut form = download("leave-form", true);
        repo.create(&form).await.unwrap();
        repo.create(&download("draft", false)).await.unwrap();

        assert_eq!(repo.list_all().await.unwrap().len(), 2);
        assert_eq!(repo.list_published().await.unwrap().len(), 1);
        assert_eq!(repo.count().await.unwrap(), 2);

        form.file_name = "leave-form-v2.pdf".to_string();
        form.file_size = Some(2048);
        assert!(repo.update(&form).await.unwrap());
        let stored = repo.get_by_id(&form.id).await.unwrap().unwrap();
        assert_eq!(stored.file_name, "leave-form-v2.pdf");
        assert_eq!(stored.file_size, Some(2048));

        assert!(repo.delete(&form.id).await.unwrap());
        assert!(!repo.delete(&form.id).await.unwrap());
    }
}

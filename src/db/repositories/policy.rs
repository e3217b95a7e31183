//! Policy repository

use crate::db::{escape_like, DynDatabasePool};
use crate::models::Policy;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

const POLICY_COLUMNS: &str =
    "id, title, slug, description, category, file_url, published, created_at, updated_at";

#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn create(&self, policy: &Policy) -> Result<Policy>;

    /// Returns false when the row does not exist
    async fn update(&self, policy: &Policy) -> Result<bool>;

    /// Returns false when the row does not exist
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Policy>>;

    /// Every policy, newest first
    async fn list_all(&self) -> Result<Vec<Policy>>;

    /// Published policies, newest first
    async fn list_published(&self) -> Result<Vec<Policy>>;

    /// Slugs equal to `base` or of the form `base-…`, ignoring row `exclude_id`
    async fn find_slugs(&self, base: &str, exclude_id: Option<&str>) -> Result<Vec<String>>;

    /// Published policies whose title or description matches a LIKE pattern
    async fn search(&self, pattern: &str, limit: i64) -> Result<Vec<Policy>>;

    async fn count(&self) -> Result<i64>;
}

pub struct SqlxPolicyRepository {
    pool: DynDatabasePool,
}

impl SqlxPolicyRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PolicyRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PolicyRepository for SqlxPolicyRepository {
    async fn create(&self, policy: &Policy) -> Result<Policy> {
        with_pool!(self.pool, |db| {
            sqlx::query(
                r#"
                INSERT INTO policies (id, title, slug, description, category, file_url, published, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&policy.id)
            .bind(&policy.title)
            .bind(&policy.slug)
            .bind(&policy.description)
            .bind(&policy.category)
            .bind(&policy.file_url)
            .bind(policy.published)
            .bind(policy.created_at)
            .bind(policy.updated_at)
            .execute(db)
            .await
            .map(|_| ())
            .context("Failed to create policy")
        })?;

        Ok(policy.clone())
    }

    async fn update(&self, policy: &Policy) -> Result<bool> {
        let affected = with_pool!(self.pool, |db| {
            sqlx::query(
                r#"
                UPDATE policies
                SET title = ?, slug = ?, description = ?, category = ?, file_url = ?, published = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&policy.title)
            .bind(&policy.slug)
            .bind(&policy.description)
            .bind(&policy.category)
            .bind(&policy.file_url)
            .bind(policy.published)
            .bind(policy.updated_at)
            .bind(&policy.id)
            .execute(db)
            .await
            .map(|r| r.rows_affected())
            .context("Failed to update policy")
        })?;
        Ok(affected > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let affected = with_pool!(self.pool, |db| {
            sqlx::query("DELETE FROM policies WHERE id = ?")
                .bind(id)
                .execute(db)
                .await
                .map(|r| r.rows_affected())
                .context("Failed to delete policy")
        })?;
        Ok(affected > 0)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Policy>> {
        let sql = format!("SELECT {} FROM policies WHERE id = ?", POLICY_COLUMNS);
        with_pool!(self.pool, |db| {
            sqlx::query_as::<_, Policy>(&sql)
                .bind(id)
                .fetch_optional(db)
                .await
                .context("Failed to get policy")
        })
    }

    async fn list_all(&self) -> Result<Vec<Policy>> {
        let sql = format!("SELECT {} FROM policies ORDER BY created_at DESC", POLICY_COLUMNS);
        with_pool!(self.pool, |db| {
            sqlx::query_as::<_, Policy>(&sql)
                .fetch_all(db)
                .await
                .context("Failed to list policies")
        })
    }

    async fn list_published(&self) -> Result<Vec<Policy>> {
        let sql = format!(
            "SELECT {} FROM policies WHERE published = ? ORDER BY created_at DESC",
            POLICY_COLUMNS
        );
        with_pool!(self.pool, |db| {
            sqlx::query_as::<_, Policy>(&sql)
                .bind(true)
                .fetch_all(db)
                .await
                .context("Failed to list published policies")
        })
    }

    async fn find_slugs(&self, base: &str, exclude_id: Option<&str>) -> Result<Vec<String>> {
        let prefix = format!("{}-%", escape_like(base));
        let exclude_id = exclude_id.unwrap_or("");
        with_pool!(self.pool, |db| {
            sqlx::query_scalar::<_, String>(
                "SELECT slug FROM policies WHERE (slug = ? OR slug LIKE ? ESCAPE '!') AND id <> ?",
            )
            .bind(base)
            .bind(&prefix)
            .bind(exclude_id)
            .fetch_all(db)
            .await
            .context("Failed to look up policy slugs")
        })
    }

    async fn search(&self, pattern: &str, limit: i64) -> Result<Vec<Policy>> {
        let sql = format!(
            r#"
            SELECT {} FROM policies
            WHERE published = ? AND (title LIKE ? ESCAPE '!' OR description LIKE ? ESCAPE '!')
            ORDER BY created_at DESC
            LIMIT {}
            "#,
            POLICY_COLUMNS, limit
        );
        with_pool!(self.pool, |db| {
            sqlx::query_as::<_, Policy>(&sql)
                .bind(true)
                .bind(pattern)
                .bind(pattern)
                .fetch_all(db)
                .await
                .context("Failed to search policies")
        })
    }

    async fn count(&self) -> Result<i64> {
        with_pool!(self.pool, |db| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM policies")
                .fetch_one(db)
                .await
                .context("Failed to count policies")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::like_pattern;
    use crate::db::repositories::test_support::setup_pool;
    use crate::models::new_id;
    use chrono::Utc;

    fn policy(title: &str, slug: &str, description: Option<&str>, published: bool) -> Policy {
        let now = Utc::now();
        Policy {
            id: new_id(),
            title: title.to_string(),
            slug: slug.to_string(),
            description: description.map(str::to_string),
            category: "Employment".to_string(),
            file_url: None,
            published,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_crud() {
        let repo = SqlxPolicyRepository::new(setup_pool().await);
        let mut item = policy("Leave", "leave", None, true);
        repo.create(&item).await.unwrap();

        item.file_url = Some("/uploads/policies/1-leave.pdf".to_string());
        assert!(repo.update(&item).await.unwrap());
        let stored = repo.get_by_id(&item.id).await.unwrap().unwrap();
        assert_eq!(stored.file_url.as_deref(), Some("/uploads/policies/1-leave.pdf"));

        assert!(repo.delete(&item.id).await.unwrap());
        assert!(repo.get_by_id(&item.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_matches_description_and_skips_drafts() {
        let repo = SqlxPolicyRepository::new(setup_pool().await);
        repo.create(&policy("Leave", "leave", Some("Annual leave entitlements"), true))
            .await
            .unwrap();
        repo.create(&policy("Draft leave", "draft-leave", None, false))
            .await
            .unwrap();

        let hits = repo.search(&like_pattern("entitlements"), 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        let hits = repo.search(&like_pattern("leave"), 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(repo.list_published().await.unwrap().len(), 1);
        assert_eq!(repo.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_find_slugs() {
        let repo = SqlxPolicyRepository::new(setup_pool().await);
        repo.create(&policy("Leave", "leave", None, true)).await.unwrap();
        repo.create(&policy("Leave", "leave-1", None, true)).await.unwrap();

        let mut slugs = repo.find_slugs("leave", None).await.unwrap();
        slugs.sort();
        assert_eq!(slugs, vec!["leave".to_string(), "leave-1".to_string()]);
        assert!(repo.find_slugs("travel", None).await.unwrap().is_empty());
    }
}

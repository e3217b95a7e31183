//! User repository
//!
//! Database operations for staff accounts.

use crate::db::DynDatabasePool;
use crate::models::{Role, User};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

const USER_COLUMNS: &str = "id, name, email, email_verified, image, role, created_at";

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: &str) -> Result<Option<User>>;

    /// Look up a user by (lowercase) email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// All users, newest first
    async fn list(&self) -> Result<Vec<User>>;

    /// Change a user's role. Returns false when no such user exists.
    async fn update_role(&self, id: &str, role: Role) -> Result<bool>;

    async fn count(&self) -> Result<i64>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        with_pool!(self.pool, |db| {
            sqlx::query(
                r#"
                INSERT INTO users (id, name, email, email_verified, image, role, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(user.email_verified)
            .bind(&user.image)
            .bind(user.role.as_str())
            .bind(user.created_at)
            .execute(db)
            .await
            .map(|_| ())
            .context("Failed to create user")
        })?;

        Ok(user.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        with_pool!(self.pool, |db| {
            sqlx::query_as::<_, User>(&sql)
                .bind(id)
                .fetch_optional(db)
                .await
                .context("Failed to get user by ID")
        })
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
        let email = email.trim().to_lowercase();
        with_pool!(self.pool, |db| {
            sqlx::query_as::<_, User>(&sql)
                .bind(&email)
                .fetch_optional(db)
                .await
                .context("Failed to get user by email")
        })
    }

    async fn list(&self) -> Result<Vec<User>> {
        let sql = format!("SELECT {} FROM users ORDER BY created_at DESC", USER_COLUMNS);
        with_pool!(self.pool, |db| {
            sqlx::query_as::<_, User>(&sql)
                .fetch_all(db)
                .await
                .context("Failed to list users")
        })
    }

    async fn update_role(&self, id: &str, role: Role) -> Result<bool> {
        let affected = with_pool!(self.pool, |db| {
            sqlx::query("UPDATE users SET role = ? WHERE id = ?")
                .bind(role.as_str())
                .bind(id)
                .execute(db)
                .await
                .map(|r| r.rows_affected())
                .context("Failed to update user role")
        })?;
        Ok(affected > 0)
    }

    async fn count(&self) -> Result<i64> {
        with_pool!(self.pool, |db| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
                .fetch_one(db)
                .await
                .context("Failed to count users")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::setup_pool;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_create_and_get_user() {
        let pool = setup_pool().await;
        let repo = SqlxUserRepository::new(pool);

        let user = User::new_staff("jane@4wdc.com.au");
        repo.create(&user).await.expect("Failed to create user");

        let by_id = repo.get_by_id(&user.id).await.unwrap().expect("user by id");
        assert_eq!(by_id.email, "jane@4wdc.com.au");
        assert_eq!(by_id.role, Role::Staff);
        assert!(by_id.email_verified.is_some());

        let by_email = repo
            .get_by_email("JANE@4wdc.com.au")
            .await
            .unwrap()
            .expect("user by email");
        assert_eq!(by_email.id, user.id);

        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_fails() {
        let pool = setup_pool().await;
        let repo = SqlxUserRepository::new(pool);

        repo.create(&User::new_staff("a@4wdc.com.au")).await.unwrap();
        let result = repo.create(&User::new_staff("a@4wdc.com.au")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_list_newest_first_and_count() {
        let pool = setup_pool().await;
        let repo = SqlxUserRepository::new(pool);

        let mut older = User::new_staff("old@4wdc.com.au");
        older.created_at = Utc::now() - Duration::days(2);
        let newer = User::new_staff("new@4wdc.com.au");
        repo.create(&older).await.unwrap();
        repo.create(&newer).await.unwrap();

        let users = repo.list().await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].email, "new@4wdc.com.au");
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_role() {
        let pool = setup_pool().await;
        let repo = SqlxUserRepository::new(pool);

        let user = User::new_staff("ed@4wdc.com.au");
        repo.create(&user).await.unwrap();

        assert!(repo.update_role(&user.id, Role::Editor).await.unwrap());
        let updated = repo.get_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(updated.role, Role::Editor);

        assert!(!repo.update_role("missing", Role::Admin).await.unwrap());
    }
}

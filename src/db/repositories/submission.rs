//! Submission repository
//!
//! Staff stories and ideas plus their moderation state.

use crate::db::DynDatabasePool;
use crate::models::{Submission, SubmissionStatus, SubmissionWithAuthor};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

const SUBMISSION_COLUMNS: &str = "s.id, s.type, s.title, s.content, s.author_id, s.status, s.reviewed_by, s.review_note, s.created_at, s.updated_at";

#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    async fn create(&self, submission: &Submission) -> Result<Submission>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Submission>>;

    /// One author's submissions, newest first
    async fn list_by_author(&self, author_id: &str) -> Result<Vec<Submission>>;

    /// Every submission with its author's name and email, newest first
    async fn list_with_authors(&self) -> Result<Vec<SubmissionWithAuthor>>;

    /// Record a moderation decision. Returns false when the row does not exist.
    async fn review(
        &self,
        id: &str,
        status: SubmissionStatus,
        reviewed_by: &str,
        note: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    async fn count_by_status(&self, status: SubmissionStatus) -> Result<i64>;
}

pub struct SqlxSubmissionRepository {
    pool: DynDatabasePool,
}

impl SqlxSubmissionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SubmissionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SubmissionRepository for SqlxSubmissionRepository {
    async fn create(&self, submission: &Submission) -> Result<Submission> {
        with_pool!(self.pool, |db| {
            sqlx::query(
                r#"
                INSERT INTO submissions (id, type, title, content, author_id, status, reviewed_by, review_note, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&submission.id)
            .bind(submission.kind.as_str())
            .bind(&submission.title)
            .bind(&submission.content)
            .bind(&submission.author_id)
            .bind(submission.status.as_str())
            .bind(&submission.reviewed_by)
            .bind(&submission.review_note)
            .bind(submission.created_at)
            .bind(submission.updated_at)
            .execute(db)
            .await
            .map(|_| ())
            .context("Failed to create submission")
        })?;

        Ok(submission.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Submission>> {
        let sql = format!("SELECT {} FROM submissions s WHERE s.id = ?", SUBMISSION_COLUMNS);
        with_pool!(self.pool, |db| {
            sqlx::query_as::<_, Submission>(&sql)
                .bind(id)
                .fetch_optional(db)
                .await
                .context("Failed to get submission")
        })
    }

    async fn list_by_author(&self, author_id: &str) -> Result<Vec<Submission>> {
        let sql = format!(
            "SELECT {} FROM submissions s WHERE s.author_id = ? ORDER BY s.created_at DESC",
            SUBMISSION_COLUMNS
        );
        with_pool!(self.pool, |db| {
            sqlx::query_as::<_, Submission>(&sql)
                .bind(author_id)
                .fetch_all(db)
                .await
                .context("Failed to list submissions by author")
        })
    }

    async fn list_with_authors(&self) -> Result<Vec<SubmissionWithAuthor>> {
        let sql = format!(
            r#"
            SELECT {}, u.name AS author_name, u.email AS author_email
            FROM submissions s
            LEFT JOIN users u ON u.id = s.author_id
            ORDER BY s.created_at DESC
            "#,
            SUBMISSION_COLUMNS
        );
        with_pool!(self.pool, |db| {
            sqlx::query_as::<_, SubmissionWithAuthor>(&sql)
                .fetch_all(db)
                .await
                .context("Failed to list submissions")
        })
    }

    async fn review(
        &self,
        id: &str,
        status: SubmissionStatus,
        reviewed_by: &str,
        note: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let affected = with_pool!(self.pool, |db| {
            sqlx::query(
                r#"
                UPDATE submissions
                SET status = ?, reviewed_by = ?, review_note = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(status.as_str())
            .bind(reviewed_by)
            .bind(note)
            .bind(at)
            .bind(id)
            .execute(db)
            .await
            .map(|r| r.rows_affected())
            .context("Failed to review submission")
        })?;
        Ok(affected > 0)
    }

    async fn count_by_status(&self, status: SubmissionStatus) -> Result<i64> {
        with_pool!(self.pool, |db| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM submissions WHERE status = ?")
                .bind(status.as_str())
                .fetch_one(db)
                .await
                .context("Failed to count submissions")
        })
    }
}

//! News service
//!
//! Articles are addressed by slug. Slugs are derived from the title, made
//! unique with a numeric suffix, and regenerated only when the title changes.

use chrono::Utc;
use std::sync::Arc;

use crate::cache::SharedPageCache;
use crate::db::repositories::NewsRepository;
use crate::models::{new_id, News, NewsInput, SessionUser};
use crate::services::error::{OrFail, ServiceError, ServiceResult};
use crate::services::slug::{generate_unique_slug, slugify};
use crate::services::{check_author, optional, require_editor, required};

const PATHS: &[&str] = &["/admin/news", "/news", "/dashboard"];

pub struct NewsService {
    repo: Arc<dyn NewsRepository>,
    cache: SharedPageCache,
}

impl NewsService {
    pub fn new(repo: Arc<dyn NewsRepository>, cache: SharedPageCache) -> Self {
        Self { repo, cache }
    }

    async fn unique_slug(&self, title: &str, exclude_id: Option<&str>) -> anyhow::Result<String> {
        let base = slugify(title);
        let existing = self.repo.find_slugs(&base, exclude_id).await?;
        Ok(generate_unique_slug(&base, &existing))
    }

    pub async fn create(&self, actor: &SessionUser, input: NewsInput) -> ServiceResult<News> {
        require_editor(actor)?;
        let author_id = check_author(actor, input.author_id.as_deref())?;
        let title = required(&input.title, "Title and content are required")?;
        let content = required(&input.content, "Title and content are required")?;

        let slug = self
            .unique_slug(&title, None)
            .await
            .or_fail("Failed to create article")?;

        let now = Utc::now();
        let news = News {
            id: new_id(),
            title,
            slug,
            content,
            excerpt: optional(input.excerpt.as_deref()),
            author_id: Some(author_id),
            published: input.published,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .repo
            .create(&news)
            .await
            .or_fail("Failed to create article")?;

        self.cache.revalidate_all(PATHS).await;
        tracing::info!("News article {} ({}) created", created.id, created.slug);
        Ok(created)
    }

    pub async fn update(&self, actor: &SessionUser, id: &str, input: NewsInput) -> ServiceResult<News> {
        require_editor(actor)?;
        let title = required(&input.title, "Title and content are required")?;
        let content = required(&input.content, "Title and content are required")?;

        let existing = self
            .repo
            .get_by_id(id)
            .await
            .or_fail("Failed to update article")?
            .ok_or_else(|| ServiceError::not_found("Article not found"))?;

        let slug = if title != existing.title {
            self.unique_slug(&title, Some(id))
                .await
                .or_fail("Failed to update article")?
        } else {
            existing.slug.clone()
        };

        let updated = News {
            title,
            slug,
            content,
            excerpt: optional(input.excerpt.as_deref()),
            published: input.published,
            updated_at: Utc::now(),
            ..existing
        };

        if !self
            .repo
            .update(&updated)
            .await
            .or_fail("Failed to update article")?
        {
            return Err(ServiceError::not_found("Article not found"));
        }

        self.cache.revalidate_all(PATHS).await;
        Ok(updated)
    }

    pub async fn delete(&self, actor: &SessionUser, id: &str) -> ServiceResult<()> {
        require_editor(actor)?;
        if !self
            .repo
            .delete(id)
            .await
            .or_fail("Failed to delete article")?
        {
            return Err(ServiceError::not_found("Article not found"));
        }
        self.cache.revalidate_all(PATHS).await;
        tracing::info!("News article {} deleted by {}", id, actor.email);
        Ok(())
    }

    pub async fn get(&self, actor: &SessionUser, id: &str) -> ServiceResult<News> {
        require_editor(actor)?;
        self.repo
            .get_by_id(id)
            .await
            .or_fail("Failed to load article")?
            .ok_or_else(|| ServiceError::not_found("Article not found"))
    }

    pub async fn list_all(&self, actor: &SessionUser) -> ServiceResult<Vec<News>> {
        require_editor(actor)?;
        self.repo.list_all().await.or_fail("Failed to load articles")
    }

    /// Published articles, newest first
    pub async fn list_published(&self) -> ServiceResult<Vec<News>> {
        self.cache
            .get_or_load("/news", None, || async {
                self.repo
                    .list_published(None)
                    .await
                    .or_fail("Failed to load articles")
            })
            .await
    }

    /// A published article by slug
    pub async fn get_published(&self, slug: &str) -> ServiceResult<News> {
        let path = format!("/news/{}", slug);
        self.cache
            .get_or_load(&path, None, || async {
                self.repo
                    .get_published_by_slug(slug)
                    .await
                    .or_fail("Failed to load article")
            })
            .await?
            .ok_or_else(|| ServiceError::not_found("Article not found"))
    }
}

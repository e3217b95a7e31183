//! Announcement service
//!
//! Announcements are short notices. Signed-in staff see every published
//! announcement; anonymous visitors only see the public ones.

use chrono::Utc;
use std::sync::Arc;

use crate::cache::SharedPageCache;
use crate::db::repositories::AnnouncementRepository;
use crate::models::{new_id, Announcement, AnnouncementInput, SessionUser};
use crate::services::error::{OrFail, ServiceError, ServiceResult};
use crate::services::{check_author, require_editor, required};

const PATHS: &[&str] = &["/admin/announcements", "/announcements", "/dashboard"];

pub struct AnnouncementService {
    repo: Arc<dyn AnnouncementRepository>,
    cache: SharedPageCache,
}

impl AnnouncementService {
    pub fn new(repo: Arc<dyn AnnouncementRepository>, cache: SharedPageCache) -> Self {
        Self { repo, cache }
    }

    async fn revalidate(&self, touches_home: bool) {
        self.cache.revalidate_all(PATHS).await;
        if touches_home {
            self.cache.revalidate("/").await;
        }
    }

    pub async fn create(
        &self,
        actor: &SessionUser,
        input: AnnouncementInput,
    ) -> ServiceResult<Announcement> {
        require_editor(actor)?;
        let author_id = check_author(actor, input.author_id.as_deref())?;
        let title = required(&input.title, "Title and content are required")?;
        let content = required(&input.content, "Title and content are required")?;

        let now = Utc::now();
        let announcement = Announcement {
            id: new_id(),
            title,
            content,
            author_id: Some(author_id),
            is_public: input.is_public,
            published: input.published,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .repo
            .create(&announcement)
            .await
            .or_fail("Failed to create announcement")?;

        self.revalidate(created.is_public).await;
        tracing::info!("Announcement {} created by {}", created.id, actor.email);
        Ok(created)
    }

    pub async fn update(
        &self,
        actor: &SessionUser,
        id: &str,
        input: AnnouncementInput,
    ) -> ServiceResult<Announcement> {
        require_editor(actor)?;
        let title = required(&input.title, "Title and content are required")?;
        let content = required(&input.content, "Title and content are required")?;

        let existing = self
            .repo
            .get_by_id(id)
            .await
            .or_fail("Failed to update announcement")?
            .ok_or_else(|| ServiceError::not_found("Announcement not found"))?;
        let was_public = existing.is_public;

        let updated = Announcement {
            title,
            content,
            is_public: input.is_public,
            published: input.published,
            updated_at: Utc::now(),
            ..existing
        };

        if !self
            .repo
            .update(&updated)
            .await
            .or_fail("Failed to update announcement")?
        {
            return Err(ServiceError::not_found("Announcement not found"));
        }

        self.revalidate(was_public || updated.is_public).await;
        Ok(updated)
    }

    pub async fn delete(&self, actor: &SessionUser, id: &str) -> ServiceResult<()> {
        require_editor(actor)?;

        let existing = self
            .repo
            .get_by_id(id)
            .await
            .or_fail("Failed to delete announcement")?
            .ok_or_else(|| ServiceError::not_found("Announcement not found"))?;

        if !self
            .repo
            .delete(id)
            .await
            .or_fail("Failed to delete announcement")?
        {
            return Err(ServiceError::not_found("Announcement not found"));
        }

        self.revalidate(existing.is_public).await;
        tracing::info!("Announcement {} deleted by {}", id, actor.email);
        Ok(())
    }

    /// Every announcement, drafts included, for the admin list
    pub async fn list_all(&self, actor: &SessionUser) -> ServiceResult<Vec<Announcement>> {
        require_editor(actor)?;
        self.repo
            .list_all()
            .await
            .or_fail("Failed to load announcements")
    }

    /// Published announcements the viewer may see, newest first
    pub async fn list_visible(
        &self,
        viewer: Option<&SessionUser>,
    ) -> ServiceResult<Vec<Announcement>> {
        let public_only = viewer.is_none();
        let variant = if public_only { "public" } else { "staff" };
        self.cache
            .get_or_load("/announcements", Some(variant), || async {
                self.repo
                    .list_published(public_only, None)
                    .await
                    .or_fail("Failed to load announcements")
            })
            .await
    }

    /// One announcement, if the viewer may see it
    pub async fn get_visible(
        &self,
        viewer: Option<&SessionUser>,
        id: &str,
    ) -> ServiceResult<Announcement> {
        let announcement = self
            .repo
            .get_by_id(id)
            .await
            .or_fail("Failed to load announcement")?
            .filter(|a| a.published && (a.is_public || viewer.is_some()))
            .ok_or_else(|| ServiceError::not_found("Announcement not found"))?;
        Ok(announcement)
    }

    /// Announcement by id regardless of state, for the editor form
    pub async fn get(&self, actor: &SessionUser, id: &str) -> ServiceResult<Announcement> {
        require_editor(actor)?;
        self.repo
            .get_by_id(id)
            .await
            .or_fail("Failed to load announcement")?
            .ok_or_else(|| ServiceError::not_found("Announcement not found"))
    }
}

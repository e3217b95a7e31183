//! Download service
//!
//! Every download is backed by an uploaded file. Replacing the file updates
//! the stored name and size along with the URL.

use chrono::Utc;
use std::sync::Arc;

use crate::cache::SharedPageCache;
use crate::db::repositories::DownloadRepository;
use crate::models::{new_id, Download, DownloadInput, SessionUser, DOWNLOAD_CATEGORIES};
use crate::services::error::{OrFail, ServiceError, ServiceResult};
use crate::services::upload::{UploadService, UploadedFile};
use crate::services::{optional, require_editor, required};

const PATHS: &[&str] = &["/admin/downloads", "/downloads", "/dashboard"];
const UPLOAD_FOLDER: &str = "downloads";

pub struct DownloadService {
    repo: Arc<dyn DownloadRepository>,
    uploads: Arc<UploadService>,
    cache: SharedPageCache,
}

fn validate(input: &DownloadInput) -> ServiceResult<(String, String)> {
    let title = required(&input.title, "Title and category are required")?;
    let category = input.category.trim();
    if !DOWNLOAD_CATEGORIES.contains(&category) {
        return Err(ServiceError::invalid("Invalid category"));
    }
    Ok((title, category.to_string()))
}

impl DownloadService {
    pub fn new(
        repo: Arc<dyn DownloadRepository>,
        uploads: Arc<UploadService>,
        cache: SharedPageCache,
    ) -> Self {
        Self {
            repo,
            uploads,
            cache,
        }
    }

    pub async fn create(
        &self,
        actor: &SessionUser,
        input: DownloadInput,
        file: Option<UploadedFile>,
    ) -> ServiceResult<Download> {
        require_editor(actor)?;
        let (title, category) = validate(&input)?;
        let file = file.ok_or_else(|| ServiceError::invalid("File is required"))?;

        let stored = self.uploads.store(UPLOAD_FOLDER, &file).await?;

        let now = Utc::now();
        let download = Download {
            id: new_id(),
            title,
            description: optional(input.description.as_deref()),
            category,
            file_url: stored.url,
            file_name: stored.file_name,
            file_size: Some(stored.size),
            published: input.published,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .repo
            .create(&download)
            .await
            .or_fail("Failed to create download")?;
        self.cache.revalidate_all(PATHS).await;
        tracing::info!("Download {} created by {}", created.id, actor.email);
        Ok(created)
    }

    pub async fn update(
        &self,
        actor: &SessionUser,
        id: &str,
        input: DownloadInput,
        file: Option<UploadedFile>,
    ) -> ServiceResult<Download> {
        require_editor(actor)?;
        let (title, category) = validate(&input)?;

        let existing = self
            .repo
            .get_by_id(id)
            .await
            .or_fail("Failed to update download")?
            .ok_or_else(|| ServiceError::not_found("Download not found"))?;

        let mut updated = Download {
            title,
            description: optional(input.description.as_deref()),
            category,
            published: input.published,
            updated_at: Utc::now(),
            ..existing
        };
        if let Some(file) = file {
            let stored = self.uploads.store(UPLOAD_FOLDER, &file).await?;
            updated.file_url = stored.url;
            updated.file_name = stored.file_name;
            updated.file_size = Some(stored.size);
        }

        if !self
            .repo
            .update(&updated)
            .await
            .or_fail("Failed to update download")?
        {
            return Err(ServiceError::not_found("Download not found"));
        }
        self.cache.revalidate_all(PATHS).await;
        Ok(updated)
    }

    pub async fn delete(&self, actor: &SessionUser, id: &str) -> ServiceResult<()> {
        require_editor(actor)?;
        if !self.repo.delete(id).await.or_fail("Failed to delete download")? {
            return Err(ServiceError::not_found("Download not found"));
        }
        self.cache.revalidate_all(PATHS).await;
        Ok(())
    }

    pub async fn get(&self, actor: &SessionUser, id: &str) -> ServiceResult<Download> {
        require_editor(actor)?;
        self.repo
            .get_by_id(id)
            .await
            .or_fail("Failed to load download")?
            .ok_or_else(|| ServiceError::not_found("Download not found"))
    }

    pub async fn list_all(&self, actor: &SessionUser) -> ServiceResult<Vec<Download>> {
        require_editor(actor)?;
        self.repo.list_all().await.or_fail("Failed to load downloads")
    }

    pub async fn list_published(&self) -> ServiceResult<Vec<Download>> {
        self.cache
            .get_or_load("/downloads", None, || async {
                self.repo
                    .list_published()
                    .await
                    .or_fail("Failed to load downloads")
            })
            .await
    }
}

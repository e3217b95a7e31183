//! Policy service
//!
//! Policies carry a category from a fixed list and may have a document
//! attached. A new upload replaces the previous document's URL; the old file
//! is left in storage.

use chrono::Utc;
use std::sync::Arc;

use crate::cache::SharedPageCache;
use crate::db::repositories::PolicyRepository;
use crate::models::{new_id, Policy, PolicyInput, SessionUser, POLICY_CATEGORIES};
use crate::services::error::{OrFail, ServiceError, ServiceResult};
use crate::services::slug::{generate_unique_slug, slugify};
use crate::services::upload::{UploadService, UploadedFile};
use crate::services::{optional, require_editor, required};

const PATHS: &[&str] = &["/admin/policies", "/policies", "/dashboard"];
const UPLOAD_FOLDER: &str = "policies";

pub struct PolicyService {
    repo: Arc<dyn PolicyRepository>,
    uploads: Arc<UploadService>,
    cache: SharedPageCache,
}

fn validate_category(category: &str) -> ServiceResult<String> {
    let category = category.trim();
    if POLICY_CATEGORIES.contains(&category) {
        Ok(category.to_string())
    } else {
        Err(ServiceError::invalid("Invalid category"))
    }
}

impl PolicyService {
    pub fn new(
        repo: Arc<dyn PolicyRepository>,
        uploads: Arc<UploadService>,
        cache: SharedPageCache,
    ) -> Self {
        Self {
            repo,
            uploads,
            cache,
        }
    }

    async fn unique_slug(&self, title: &str, exclude_id: Option<&str>) -> anyhow::Result<String> {
        let base = slugify(title);
        let existing = self.repo.find_slugs(&base, exclude_id).await?;
        Ok(generate_unique_slug(&base, &existing))
    }

    pub async fn create(
        &self,
        actor: &SessionUser,
        input: PolicyInput,
        file: Option<UploadedFile>,
    ) -> ServiceResult<Policy> {
        require_editor(actor)?;
        let title = required(&input.title, "Title and category are required")?;
        let category = validate_category(&input.category)?;

        let file_url = match file {
            Some(file) => Some(self.uploads.store(UPLOAD_FOLDER, &file).await?.url),
            None => None,
        };

        let slug = self
            .unique_slug(&title, None)
            .await
            .or_fail("Failed to create policy")?;

        let now = Utc::now();
        let policy = Policy {
            id: new_id(),
            title,
            slug,
            description: optional(input.description.as_deref()),
            category,
            file_url,
            published: input.published,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .repo
            .create(&policy)
            .await
            .or_fail("Failed to create policy")?;
        self.cache.revalidate_all(PATHS).await;
        tracing::info!("Policy {} ({}) created", created.id, created.slug);
        Ok(created)
    }

    pub async fn update(
        &self,
        actor: &SessionUser,
        id: &str,
        input: PolicyInput,
        file: Option<UploadedFile>,
    ) -> ServiceResult<Policy> {
        require_editor(actor)?;
        let title = required(&input.title, "Title and category are required")?;
        let category = validate_category(&input.category)?;

        let existing = self
            .repo
            .get_by_id(id)
            .await
            .or_fail("Failed to update policy")?
            .ok_or_else(|| ServiceError::not_found("Policy not found"))?;

        let file_url = match file {
            Some(file) => Some(self.uploads.store(UPLOAD_FOLDER, &file).await?.url),
            None => existing.file_url.clone(),
        };

        let slug = if title != existing.title {
            self.unique_slug(&title, Some(id))
                .await
                .or_fail("Failed to update policy")?
        } else {
            existing.slug.clone()
        };

        let updated = Policy {
            title,
            slug,
            description: optional(input.description.as_deref()),
            category,
            file_url,
            published: input.published,
            updated_at: Utc::now(),
            ..existing
        };

        if !self
            .repo
            .update(&updated)
            .await
            .or_fail("Failed to update policy")?
        {
            return Err(ServiceError::not_found("Policy not found"));
        }
        self.cache.revalidate_all(PATHS).await;
        Ok(updated)
    }

    pub async fn delete(&self, actor: &SessionUser, id: &str) -> ServiceResult<()> {
        require_editor(actor)?;
        if !self.repo.delete(id).await.or_fail("Failed to delete policy")? {
            return Err(ServiceError::not_found("Policy not found"));
        }
        self.cache.revalidate_all(PATHS).await;
        Ok(())
    }

    pub async fn get(&self, actor: &SessionUser, id: &str) -> ServiceResult<Policy> {
        require_editor(actor)?;
        self.repo
            .get_by_id(id)
            .await
            .or_fail("Failed to load policy")?
            .ok_or_else(|| ServiceError::not_found("Policy not found"))
    }

    pub async fn list_all(&self, actor: &SessionUser) -> ServiceResult<Vec<Policy>> {
        require_editor(actor)?;
        self.repo.list_all().await.or_fail("Failed to load policies")
    }

    pub async fn list_published(&self) -> ServiceResult<Vec<Policy>> {
        self.cache
            .get_or_load("/policies", None, || async {
                self.repo
                    .list_published()
                    .await
                    .or_fail("Failed to load policies")
            })
            .await
    }
}

//! Event service

use chrono::Utc;
use std::sync::Arc;

use crate::cache::SharedPageCache;
use crate::db::repositories::EventRepository;
use crate::models::{new_id, Event, EventInput, SessionUser};
use crate::services::error::{OrFail, ServiceError, ServiceResult};
use crate::services::{optional, require_editor, required};

const PATHS: &[&str] = &["/admin/events", "/events", "/dashboard"];

pub struct EventService {
    repo: Arc<dyn EventRepository>,
    cache: SharedPageCache,
}

/// Checked fields of an `EventInput`
struct ValidEvent {
    title: String,
    description: Option<String>,
    location: Option<String>,
}

fn validate(input: &EventInput) -> ServiceResult<ValidEvent> {
    let title = required(&input.title, "Title is required")?;
    if let Some(end) = input.end_date {
        if end < input.start_date {
            return Err(ServiceError::invalid("End date must be after the start date"));
        }
    }
    Ok(ValidEvent {
        title,
        description: optional(input.description.as_deref()),
        location: optional(input.location.as_deref()),
    })
}

impl EventService {
    pub fn new(repo: Arc<dyn EventRepository>, cache: SharedPageCache) -> Self {
        Self { repo, cache }
    }

    pub async fn create(&self, actor: &SessionUser, input: EventInput) -> ServiceResult<Event> {
        require_editor(actor)?;
        let valid = validate(&input)?;

        let now = Utc::now();
        let event = Event {
            id: new_id(),
            title: valid.title,
            description: valid.description,
            location: valid.location,
            start_date: input.start_date,
            end_date: input.end_date,
            published: input.published,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .repo
            .create(&event)
            .await
            .or_fail("Failed to create event")?;
        self.cache.revalidate_all(PATHS).await;
        Ok(created)
    }

    pub async fn update(&self, actor: &SessionUser, id: &str, input: EventInput) -> ServiceResult<Event> {
        require_editor(actor)?;
        let valid = validate(&input)?;

        let existing = self
            .repo
            .get_by_id(id)
            .await
            .or_fail("Failed to update event")?
            .ok_or_else(|| ServiceError::not_found("Event not found"))?;

        let updated = Event {
            title: valid.title,
            description: valid.description,
            location: valid.location,
            start_date: input.start_date,
            end_date: input.end_date,
            published: input.published,
            updated_at: Utc::now(),
            ..existing
        };

        if !self
            .repo
            .update(&updated)
            .await
            .or_fail("Failed to update event")?
        {
            return Err(ServiceError::not_found("Event not found"));
        }
        self.cache.revalidate_all(PATHS).await;
        Ok(updated)
    }

    pub async fn delete(&self, actor: &SessionUser, id: &str) -> ServiceResult<()> {
        require_editor(actor)?;
        if !self.repo.delete(id).await.or_fail("Failed to delete event")? {
            return Err(ServiceError::not_found("Event not found"));
        }
        self.cache.revalidate_all(PATHS).await;
        Ok(())
    }

    pub async fn get(&self, actor: &SessionUser, id: &str) -> ServiceResult<Event> {
        require_editor(actor)?;
        self.repo
            .get_by_id(id)
            .await
            .or_fail("Failed to load event")?
            .ok_or_else(|| ServiceError::not_found("Event not found"))
    }

    pub async fn list_all(&self, actor: &SessionUser) -> ServiceResult<Vec<Event>> {
        require_editor(actor)?;
        self.repo.list_all().await.or_fail("Failed to load events")
    }

    /// Published events, latest start date first
    pub async fn list_published(&self) -> ServiceResult<Vec<Event>> {
        self.cache
            .get_or_load("/events", None, || async {
                self.repo
                    .list_published(None)
                    .await
                    .or_fail("Failed to load events")
            })
            .await
    }

    /// A published event by id
    pub async fn get_published(&self, id: &str) -> ServiceResult<Event> {
        let path = format!("/events/{}", id);
        self.cache
            .get_or_load(&path, None, || async {
                self.repo
                    .get_by_id(id)
                    .await
                    .map(|event| event.filter(|e| e.published))
                    .or_fail("Failed to load event")
            })
            .await?
            .ok_or_else(|| ServiceError::not_found("Event not found"))
    }
}

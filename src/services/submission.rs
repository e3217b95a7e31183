//! Staff submissions
//!
//! Any signed-in user may send a story or idea. Editors review the queue and
//! may attach a note, which is emailed back to the author.

use chrono::Utc;
use std::sync::Arc;

use crate::db::repositories::{SubmissionRepository, UserRepository};
use crate::models::{
    new_id, CreateSubmissionInput, ReviewSubmissionInput, SessionUser, Submission,
    SubmissionStatus, SubmissionType, SubmissionWithAuthor,
};
use crate::services::email::EmailService;
use crate::services::error::{OrFail, ServiceError, ServiceResult};
use crate::services::user::display_name;
use crate::services::{optional, require_editor};

pub struct SubmissionService {
    repo: Arc<dyn SubmissionRepository>,
    users: Arc<dyn UserRepository>,
    email: Arc<EmailService>,
}

impl SubmissionService {
    pub fn new(
        repo: Arc<dyn SubmissionRepository>,
        users: Arc<dyn UserRepository>,
        email: Arc<EmailService>,
    ) -> Self {
        Self { repo, users, email }
    }

    pub async fn create(
        &self,
        actor: &SessionUser,
        input: CreateSubmissionInput,
    ) -> ServiceResult<Submission> {
        let invalid = || ServiceError::invalid("Invalid request");
        if input.user_id != actor.id {
            return Err(invalid());
        }
        let kind: SubmissionType = input.kind.parse().map_err(|_| invalid())?;
        let title = input.title.trim();
        let content = input.content.trim();
        if title.is_empty() || content.is_empty() {
            return Err(invalid());
        }

        let now = Utc::now();
        let submission = Submission {
            id: new_id(),
            kind,
            title: title.to_string(),
            content: content.to_string(),
            author_id: actor.id.clone(),
            status: SubmissionStatus::Pending,
            reviewed_by: None,
            review_note: None,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .repo
            .create(&submission)
            .await
            .or_fail("Failed to create submission")?;
        tracing::info!("New {} submission {} from {}", created.kind, created.id, actor.email);

        self.email
            .notify_new_submission(
                created.kind.as_str(),
                &created.title,
                &display_name(actor.name.as_deref(), &actor.email),
                &actor.email,
            )
            .await;

        Ok(created)
    }

    /// The actor's own submissions, newest first
    pub async fn list_mine(&self, actor: &SessionUser) -> ServiceResult<Vec<Submission>> {
        self.repo
            .list_by_author(&actor.id)
            .await
            .or_fail("Failed to load submissions")
    }

    /// Every submission with its author, newest first
    pub async fn list_all(&self, actor: &SessionUser) -> ServiceResult<Vec<SubmissionWithAuthor>> {
        require_editor(actor)?;
        self.repo
            .list_with_authors()
            .await
            .or_fail("Failed to load submissions")
    }

    pub async fn review(&self, actor: &SessionUser, input: ReviewSubmissionInput) -> ServiceResult<()> {
        require_editor(actor)?;
        let invalid = || ServiceError::invalid("Invalid request");
        if input.submission_id.trim().is_empty() {
            return Err(invalid());
        }
        let status: SubmissionStatus = input.status.parse().map_err(|_| invalid())?;
        let note = optional(input.note.as_deref());

        let submission = self
            .repo
            .get_by_id(&input.submission_id)
            .await
            .or_fail("Failed to update submission")?
            .ok_or_else(|| ServiceError::not_found("Submission not found"))?;

        if !self
            .repo
            .review(&submission.id, status, &actor.id, note.as_deref(), Utc::now())
            .await
            .or_fail("Failed to update submission")?
        {
            return Err(ServiceError::not_found("Submission not found"));
        }
        tracing::info!("Submission {} marked {} by {}", submission.id, status, actor.email);

        if let Some(note) = note {
            match self.users.get_by_id(&submission.author_id).await {
                Ok(Some(author)) => {
                    self.email
                        .notify_submission_response(
                            &author.email,
                            &display_name(author.name.as_deref(), &author.email),
                            submission.kind.as_str(),
                            &note,
                        )
                        .await;
                }
                Ok(None) => tracing::warn!("Author of submission {} no longer exists", submission.id),
                Err(e) => tracing::error!("Failed to load submission author: {:#}", e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::setup_pool;
    use crate::db::repositories::{SqlxSubmissionRepository, SqlxUserRepository};
    use crate::models::Role;
    use crate::services::email::MemoryMailer;
    use crate::services::test_support::actor;

    struct Fixture {
        service: SubmissionService,
        repo: Arc<dyn SubmissionRepository>,
        mailer: Arc<MemoryMailer>,
        staff: SessionUser,
        editor: SessionUser,
    }

    async fn setup() -> Fixture {
        let pool = setup_pool().await;
        let mailer = Arc::new(MemoryMailer::new());
        let email = Arc::new(
            EmailService::new(
                mailer.clone(),
                "Wellbeing Hub",
                "http://hub.test",
                Some("wellbeing@4wdc.com.au".to_string()),
            )
            .unwrap(),
        );
        let repo = SqlxSubmissionRepository::boxed(pool.clone());
        let service = SubmissionService::new(repo.clone(), SqlxUserRepository::boxed(pool.clone()), email);
        Fixture {
            service,
            repo,
            mailer,
            staff: actor(&pool, "jmanio@4wdc.com.au", Role::Staff).await,
            editor: actor(&pool, "editor@4wdc.com.au", Role::Editor).await,
        }
    }

    fn input(user_id: &str, kind: &str) -> CreateSubmissionInput {
        CreateSubmissionInput {
            kind: kind.to_string(),
            title: "Standing desks".to_string(),
            content: "Could we trial some?".to_string(),
            user_id: user_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_notifies_admin_inbox() {
        let f = setup().await;
        let created = f.service.create(&f.staff, input(&f.staff.id, "idea")).await.unwrap();
        assert_eq!(created.status, SubmissionStatus::Pending);
        assert_eq!(created.kind, SubmissionType::Idea);

        let sent = f.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "wellbeing@4wdc.com.au");
        assert!(sent[0].text.contains("J. Manio"));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let f = setup().await;
        let bad = [
            input(&f.editor.id, "idea"),
            input(&f.staff.id, "complaint"),
            CreateSubmissionInput {
                title: " ".into(),
                ..input(&f.staff.id, "story")
            },
        ];
        for request in bad {
            assert_eq!(
                f.service.create(&f.staff, request).await.unwrap_err(),
                ServiceError::invalid("Invalid request")
            );
        }
    }

    #[tokio::test]
    async fn test_lists() {
        let f = setup().await;
        f.service.create(&f.staff, input(&f.staff.id, "story")).await.unwrap();
        f.service.create(&f.editor, input(&f.editor.id, "idea")).await.unwrap();

        assert_eq!(f.service.list_mine(&f.staff).await.unwrap().len(), 1);
        assert_eq!(f.service.list_all(&f.staff).await.unwrap_err(), ServiceError::Unauthorized);

        let all = f.service.list_all(&f.editor).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|s| s.author_email.as_deref() == Some("jmanio@4wdc.com.au")));
    }

    #[tokio::test]
    async fn test_review_with_note_emails_author() {
        let f = setup().await;
        let created = f.service.create(&f.staff, input(&f.staff.id, "story")).await.unwrap();

        f.service
            .review(
                &f.editor,
                ReviewSubmissionInput {
                    submission_id: created.id.clone(),
                    status: "approved".into(),
                    note: Some("Lovely story".into()),
                },
            )
            .await
            .unwrap();

        let stored = f.repo.get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubmissionStatus::Approved);
        assert_eq!(stored.reviewed_by.as_deref(), Some(f.editor.id.as_str()));
        assert_eq!(stored.review_note.as_deref(), Some("Lovely story"));

        let sent = f.mailer.sent();
        let response = sent.last().unwrap();
        assert_eq!(response.to, "jmanio@4wdc.com.au");
        assert_eq!(response.subject, "Response to Your Story - Wellbeing Hub");
    }

    #[tokio::test]
    async fn test_review_without_note_sends_nothing() {
        let f = setup().await;
        let created = f.service.create(&f.staff, input(&f.staff.id, "idea")).await.unwrap();
        let before = f.mailer.sent().len();

        f.service
            .review(
                &f.editor,
                ReviewSubmissionInput {
                    submission_id: created.id.clone(),
                    status: "rejected".into(),
                    note: Some("".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(f.mailer.sent().len(), before);
        let stored = f.repo.get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.review_note, None);
        assert_eq!(stored.status, SubmissionStatus::Rejected);
    }

    #[tokio::test]
    async fn test_review_errors() {
        let f = setup().await;
        let review = |id: &str, status: &str| ReviewSubmissionInput {
            submission_id: id.to_string(),
            status: status.to_string(),
            note: None,
        };

        assert_eq!(
            f.service.review(&f.staff, review("x", "approved")).await.unwrap_err(),
            ServiceError::Unauthorized
        );
        assert_eq!(
            f.service.review(&f.editor, review("x", "archived")).await.unwrap_err(),
            ServiceError::invalid("Invalid request")
        );
        assert_eq!(
            f.service.review(&f.editor, review("x", "approved")).await.unwrap_err(),
            ServiceError::not_found("Submission not found")
        );
    }
}

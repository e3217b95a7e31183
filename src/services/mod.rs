//! Services layer
//!
//! Business rules for the hub. Services check the actor's role, validate
//! input, talk to repositories and revalidate the cached pages a change
//! affects. Every operation returns a `ServiceResult`.

pub mod announcement;
pub mod auth;
pub mod dashboard;
pub mod download;
pub mod email;
pub mod error;
pub mod event;
pub mod news;
pub mod policy;
pub mod rate_limiter;
pub mod search;
pub mod slug;
pub mod submission;
pub mod upload;
pub mod user;

pub use announcement::AnnouncementService;
pub use auth::{is_allowed_email, AuthService, ClientInfo, SignIn};
pub use dashboard::{AdminStats, DashboardData, DashboardService, HomeData};
pub use download::DownloadService;
pub use email::{create_mailer, DynMailer, EmailMessage, EmailService, Mailer, MemoryMailer};
pub use error::{OrFail, ServiceError, ServiceResult};
pub use event::EventService;
pub use news::NewsService;
pub use policy::PolicyService;
pub use rate_limiter::MagicLinkRateLimiter;
pub use search::{SearchResults, SearchService};
pub use slug::{generate_unique_slug, slugify};
pub use submission::SubmissionService;
pub use upload::{BlobStore, LocalBlobStore, StoredFile, UploadService, UploadedFile};
pub use user::{display_name, UserService};

use crate::models::SessionUser;

/// Content changes need an editor or admin
pub(crate) fn require_editor(actor: &SessionUser) -> ServiceResult<()> {
    if actor.is_editor() {
        Ok(())
    } else {
        tracing::warn!("{} ({}) attempted an editor action", actor.email, actor.role);
        Err(ServiceError::Unauthorized)
    }
}

pub(crate) fn require_admin(actor: &SessionUser) -> ServiceResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        tracing::warn!("{} ({}) attempted an admin action", actor.email, actor.role);
        Err(ServiceError::Unauthorized)
    }
}

/// `value` with surrounding whitespace removed, or `message` if nothing is left
pub(crate) fn required(value: &str, message: &str) -> ServiceResult<String> {
    let value = value.trim();
    if value.is_empty() {
        Err(ServiceError::invalid(message))
    } else {
        Ok(value.to_string())
    }
}

/// Empty optional text is stored as NULL
pub(crate) fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// The author an editor writes as must be the editor
pub(crate) fn check_author(actor: &SessionUser, author_id: Option<&str>) -> ServiceResult<String> {
    match author_id {
        Some(id) if id != actor.id => Err(ServiceError::invalid("Invalid author")),
        _ => Ok(actor.id.clone()),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn user(role: Role) -> SessionUser {
        SessionUser {
            id: "u1".into(),
            email: "a@4wdc.com.au".into(),
            name: None,
            image: None,
            role,
        }
    }

    #[test]
    fn test_role_guards() {
        assert_eq!(require_editor(&user(Role::Staff)), Err(ServiceError::Unauthorized));
        assert!(require_editor(&user(Role::Editor)).is_ok());
        assert_eq!(require_admin(&user(Role::Editor)), Err(ServiceError::Unauthorized));
        assert!(require_admin(&user(Role::Admin)).is_ok());
    }

    #[test]
    fn test_check_author() {
        let editor = user(Role::Editor);
        assert_eq!(check_author(&editor, None).unwrap(), "u1");
        assert_eq!(check_author(&editor, Some("u1")).unwrap(), "u1");
        assert_eq!(
            check_author(&editor, Some("u2")),
            Err(ServiceError::invalid("Invalid author"))
        );
    }

    #[test]
    fn test_required_and_optional() {
        assert_eq!(required("  Hi ", "Title is required").unwrap(), "Hi");
        assert!(required("   ", "Title is required").is_err());
        assert_eq!(optional(Some("  ")), None);
        assert_eq!(optional(Some(" x ")), Some("x".to_string()));
    }
}

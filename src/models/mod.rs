//! Data models
//!
//! Entity structs map one-to-one onto database rows (`sqlx::FromRow`) and
//! serialize in camelCase for the JSON API. Input structs carry what request
//! handlers accept before services validate it.

mod announcement;
mod download;
mod event;
mod news;
mod policy;
mod session;
mod submission;
mod user;

pub use announcement::{Announcement, AnnouncementInput};
pub use download::{Download, DownloadInput, DOWNLOAD_CATEGORIES};
pub use event::{Event, EventInput};
pub use news::{News, NewsInput};
pub use policy::{Policy, PolicyInput, POLICY_CATEGORIES};
pub use session::{Session, VerificationToken};
pub use submission::{
    CreateSubmissionInput, ReviewSubmissionInput, Submission, SubmissionStatus, SubmissionType,
    SubmissionWithAuthor,
};
pub use user::{Role, SessionUser, UpdateRoleInput, User};

/// Error for text that does not name a known enum variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {kind}: {value}")]
pub struct InvalidValue {
    pub kind: &'static str,
    pub value: String,
}

impl InvalidValue {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// New opaque primary key
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

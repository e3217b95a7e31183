//! Database repositories
//!
//! One repository per entity. Each exposes an async trait, used by the
//! services, and a `Sqlx*` implementation that runs against either backend.

pub mod announcement;
pub mod download;
pub mod event;
pub mod news;
pub mod policy;
pub mod session;
pub mod submission;
pub mod user;
pub mod verification;

pub use announcement::{AnnouncementRepository, SqlxAnnouncementRepository};
pub use download::{DownloadRepository, SqlxDownloadRepository};
pub use event::{EventRepository, SqlxEventRepository};
pub use news::{NewsRepository, SqlxNewsRepository};
pub use policy::{PolicyRepository, SqlxPolicyRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use submission::{SqlxSubmissionRepository, SubmissionRepository};
pub use user::{SqlxUserRepository, UserRepository};
pub use verification::{SqlxVerificationRepository, VerificationRepository};

//! Page data for the home page, the staff dashboard and the admin overview

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cache::SharedPageCache;
use crate::db::repositories::{
    AnnouncementRepository, DownloadRepository, EventRepository, NewsRepository,
    PolicyRepository, SubmissionRepository, UserRepository,
};
use crate::models::{Announcement, Event, News, Role, SessionUser, SubmissionStatus};
use crate::services::error::{OrFail, ServiceError, ServiceResult};
use crate::services::require_editor;
use crate::services::user::display_name;

/// Items per dashboard section
const SECTION_LIMIT: i64 = 3;

/// Public announcements on the home page
const HOME_LIMIT: i64 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeData {
    pub announcements: Vec<Announcement>,
}

/// Dashboard sections shared by every signed-in user
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DashboardSections {
    news: Vec<News>,
    events: Vec<Event>,
    announcements: Vec<Announcement>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub user_name: String,
    pub role: Role,
    pub news: Vec<News>,
    pub events: Vec<Event>,
    pub announcements: Vec<Announcement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub news: i64,
    pub events: i64,
    pub policies: i64,
    pub pending_submissions: i64,
    pub users: i64,
    pub downloads: i64,
}

/// Repositories the dashboards read from
pub struct DashboardRepos {
    pub announcements: Arc<dyn AnnouncementRepository>,
    pub news: Arc<dyn NewsRepository>,
    pub events: Arc<dyn EventRepository>,
    pub policies: Arc<dyn PolicyRepository>,
    pub downloads: Arc<dyn DownloadRepository>,
    pub submissions: Arc<dyn SubmissionRepository>,
    pub users: Arc<dyn UserRepository>,
}

pub struct DashboardService {
    repos: DashboardRepos,
    cache: SharedPageCache,
}

impl DashboardService {
    pub fn new(repos: DashboardRepos, cache: SharedPageCache) -> Self {
        Self { repos, cache }
    }

    /// Public home page: the newest public announcements
    pub async fn home(&self) -> ServiceResult<HomeData> {
        self.cache
            .get_or_load("/", None, || async {
                let announcements = self
                    .repos
                    .announcements
                    .list_published(true, Some(HOME_LIMIT))
                    .await
                    .or_fail("Failed to load home page")?;
                Ok::<_, ServiceError>(HomeData { announcements })
            })
            .await
    }

    pub async fn dashboard(&self, actor: &SessionUser) -> ServiceResult<DashboardData> {
        let sections: DashboardSections = self
            .cache
            .get_or_load("/dashboard", None, || async {
                let (news, events, announcements) = futures::try_join!(
                    self.repos.news.list_published(Some(SECTION_LIMIT)),
                    self.repos.events.list_published(Some(SECTION_LIMIT)),
                    self.repos
                        .announcements
                        .list_published(false, Some(SECTION_LIMIT)),
                )
                .or_fail("Failed to load dashboard")?;
                Ok::<_, ServiceError>(DashboardSections {
                    news,
                    events,
                    announcements,
                })
            })
            .await?;

        Ok(DashboardData {
            user_name: display_name(actor.name.as_deref(), &actor.email),
            role: actor.role,
            news: sections.news,
            events: sections.events,
            announcements: sections.announcements,
        })
    }

    pub async fn admin_stats(&self, actor: &SessionUser) -> ServiceResult<AdminStats> {
        require_editor(actor)?;
        let r = &self.repos;
        let (news, events, policies, pending_submissions, users, downloads) = futures::try_join!(
            r.news.count(),
            r.events.count(),
            r.policies.count(),
            r.submissions.count_by_status(SubmissionStatus::Pending),
            r.users.count(),
            r.downloads.count(),
        )
        .or_fail("Failed to load statistics")?;

        Ok(AdminStats {
            news,
            events,
            policies,
            pending_submissions,
            users,
            downloads,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_page_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::test_support::setup_pool;
    use crate::db::repositories::*;
    use crate::db::DynDatabasePool;
    use crate::models::{new_id, AnnouncementInput};
    use crate::services::announcement::AnnouncementService;
    use crate::services::test_support::actor;

    fn repos(pool: &DynDatabasePool) -> DashboardRepos {
        DashboardRepos {
            announcements: SqlxAnnouncementRepository::boxed(pool.clone()),
            news: SqlxNewsRepository::boxed(pool.clone()),
            events: SqlxEventRepository::boxed(pool.clone()),
            policies: SqlxPolicyRepository::boxed(pool.clone()),
            downloads: SqlxDownloadRepository::boxed(pool.clone()),
            submissions: SqlxSubmissionRepository::boxed(pool.clone()),
            users: SqlxUserRepository::boxed(pool.clone()),
        }
    }

    fn announcement(title: &str, is_public: bool) -> AnnouncementInput {
        AnnouncementInput {
            title: title.to_string(),
            content: "Body".to_string(),
            author_id: None,
            is_public,
            published: true,
        }
    }

    #[tokio::test]
    async fn test_home_revalidated_by_public_announcement() {
        let pool = setup_pool().await;
        let cache = create_page_cache(&CacheConfig::default());
        let dashboards = DashboardService::new(repos(&pool), cache.clone());
        let announcements =
            AnnouncementService::new(SqlxAnnouncementRepository::boxed(pool.clone()), cache);
        let editor = actor(&pool, "editor@4wdc.com.au", Role::Editor).await;

        assert!(dashboards.home().await.unwrap().announcements.is_empty());

        announcements.create(&editor, announcement("Internal", false)).await.unwrap();
        announcements.create(&editor, announcement("Public", true)).await.unwrap();

        let home = dashboards.home().await.unwrap();
        assert_eq!(home.announcements.len(), 1);
        assert_eq!(home.announcements[0].title, "Public");
    }

    #[tokio::test]
    async fn test_dashboard_includes_actor() {
        let pool = setup_pool().await;
        let dashboards =
            DashboardService::new(repos(&pool), create_page_cache(&CacheConfig::default()));
        let staff = actor(&pool, "jmanio@4wdc.com.au", Role::Staff).await;

        let data = dashboards.dashboard(&staff).await.unwrap();
        assert_eq!(data.user_name, "J. Manio");
        assert_eq!(data.role, Role::Staff);
        assert!(data.news.is_empty());
    }

    #[tokio::test]
    async fn test_admin_stats() {
        let pool = setup_pool().await;
        let r = repos(&pool);
        let editor = actor(&pool, "editor@4wdc.com.au", Role::Editor).await;
        let staff = actor(&pool, "staff@4wdc.com.au", Role::Staff).await;

        let now = chrono::Utc::now();
        r.submissions
            .create(&crate::models::Submission {
                id: new_id(),
                kind: crate::models::SubmissionType::Idea,
                title: "T".into(),
                content: "C".into(),
                author_id: staff.id.clone(),
                status: SubmissionStatus::Pending,
                reviewed_by: None,
                review_note: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let dashboards = DashboardService::new(r, create_page_cache(&CacheConfig::default()));
        assert_eq!(dashboards.admin_stats(&staff).await.unwrap_err(), ServiceError::Unauthorized);

        let stats = dashboards.admin_stats(&editor).await.unwrap();
        assert_eq!(
            stats,
            AdminStats {
                news: 0,
                events: 0,
                policies: 0,
                pending_submissions: 1,
                users: 2,
                downloads: 0,
            }
        );
    }
}

//! Site search over published news, policies and events

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::like_pattern;
use crate::db::repositories::{EventRepository, NewsRepository, PolicyRepository};
use crate::models::{Event, News, Policy};
use crate::services::error::{OrFail, ServiceResult};

/// Maximum rows returned per content type
pub const GROUP_LIMIT: i64 = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub query: String,
    pub news: Vec<News>,
    pub policies: Vec<Policy>,
    pub events: Vec<Event>,
    pub total: usize,
}

pub struct SearchService {
    news: Arc<dyn NewsRepository>,
    policies: Arc<dyn PolicyRepository>,
    events: Arc<dyn EventRepository>,
}

impl SearchService {
    pub fn new(
        news: Arc<dyn NewsRepository>,
        policies: Arc<dyn PolicyRepository>,
        events: Arc<dyn EventRepository>,
    ) -> Self {
        Self {
            news,
            policies,
            events,
        }
    }

    pub async fn search(&self, query: &str) -> ServiceResult<SearchResults> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(SearchResults::default());
        }

        let pattern = like_pattern(query);
        let (news, policies, events) = futures::try_join!(
            self.news.search(&pattern, GROUP_LIMIT),
            self.policies.search(&pattern, GROUP_LIMIT),
            self.events.search(&pattern, GROUP_LIMIT),
        )
        .or_fail("Search failed")?;

        let total = news.len() + policies.len() + events.len();
        tracing::debug!("Search {:?} matched {} items", query, total);
        Ok(SearchResults {
            query: query.to_string(),
            news,
            policies,
            events,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::setup_pool;
    use crate::db::repositories::{SqlxEventRepository, SqlxNewsRepository, SqlxPolicyRepository};
    use crate::models::new_id;
    use chrono::Utc;

    fn news(title: &str, slug: &str, published: bool) -> News {
        let now = Utc::now();
        News {
            id: new_id(),
            title: title.to_string(),
            slug: slug.to_string(),
            content: "Body".to_string(),
            excerpt: None,
            author_id: None,
            published,
            created_at: now,
            updated_at: now,
        }
    }

    fn policy(title: &str, slug: &str, description: &str) -> Policy {
        let now = Utc::now();
        Policy {
            id: new_id(),
            title: title.to_string(),
            slug: slug.to_string(),
            description: Some(description.to_string()),
            category: "Other".to_string(),
            file_url: None,
            published: true,
            created_at: now,
            updated_at: now,
        }
    }

    async fn setup() -> (SearchService, Arc<dyn NewsRepository>, Arc<dyn PolicyRepository>) {
        let pool = setup_pool().await;
        let news = SqlxNewsRepository::boxed(pool.clone());
        let policies = SqlxPolicyRepository::boxed(pool.clone());
        let service = SearchService::new(news.clone(), policies.clone(), SqlxEventRepository::boxed(pool));
        (service, news, policies)
    }

    #[tokio::test]
    async fn test_blank_query_returns_nothing() {
        let (service, news, _) = setup().await;
        news.create(&news_item()).await.unwrap();
        let results = service.search("   ").await.unwrap();
        assert_eq!(results.total, 0);
        assert!(results.news.is_empty());
    }

    fn news_item() -> News {
        news("Wellness week", "wellness-week", true)
    }

    #[tokio::test]
    async fn test_matches_published_content_only() {
        let (service, news_repo, policies) = setup().await;
        news_repo.create(&news_item()).await.unwrap();
        news_repo.create(&news("Wellness draft", "wellness-draft", false)).await.unwrap();
        policies
            .create(&policy("Leave", "leave", "Covers wellness days"))
            .await
            .unwrap();

        let results = service.search(" wellness ").await.unwrap();
        assert_eq!(results.query, "wellness");
        assert_eq!(results.news.len(), 1);
        assert_eq!(results.policies.len(), 1);
        assert_eq!(results.total, 2);
    }

    #[tokio::test]
    async fn test_groups_are_limited() {
        let (service, news_repo, _) = setup().await;
        for i in 0..12 {
            news_repo
                .create(&news(&format!("Health tip {}", i), &format!("health-tip-{}", i), true))
                .await
                .unwrap();
        }
        let results = service.search("health").await.unwrap();
        assert_eq!(results.news.len(), GROUP_LIMIT as usize);
        assert_eq!(results.total, GROUP_LIMIT as usize);
    }
}

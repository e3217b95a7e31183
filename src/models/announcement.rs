//! Announcement model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Short notice shown on the dashboard and, when public, on the home page
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author_id: Option<String>,
    /// Visible to anonymous visitors
    pub is_public: bool,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating or updating an announcement
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementInput {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default = "default_true")]
    pub published: bool,
}

fn default_true() -> bool {
    true
}

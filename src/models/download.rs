//! Downloadable resource model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Categories a download may be filed under
pub const DOWNLOAD_CATEGORIES: &[&str] = &[
    "Forms",
    "Guides",
    "Templates",
    "Training Materials",
    "Health & Safety",
    "HR Documents",
    "Other",
];

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Download {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub file_url: String,
    /// Original name of the uploaded file
    pub file_name: String,
    /// Size in bytes
    pub file_size: Option<i64>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Form fields for creating or updating a download
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    #[serde(default)]
    pub published: bool,
}

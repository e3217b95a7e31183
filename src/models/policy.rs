//! Policy document model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Categories a policy may be filed under
pub const POLICY_CATEGORIES: &[&str] = &[
    "Workplace Health & Safety",
    "Employment",
    "Code of Conduct",
    "Leave & Benefits",
    "IT & Security",
    "Training & Development",
    "Other",
];

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub category: String,
    /// Attached document, if one was uploaded
    pub file_url: Option<String>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Form fields for creating or updating a policy.
///
/// The optional document travels separately as an upload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    #[serde(default)]
    pub published: bool,
}

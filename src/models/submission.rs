//! Staff submission model
//!
//! Staff share stories and ideas; editors approve or reject them and may
//! attach a note that is emailed back to the author.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::InvalidValue;

/// What kind of contribution a submission is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionType {
    Story,
    Idea,
}

impl SubmissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Story => "story",
            Self::Idea => "idea",
        }
    }
}

impl fmt::Display for SubmissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionType {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "story" => Ok(Self::Story),
            "idea" => Ok(Self::Idea),
            _ => Err(InvalidValue::new("submission type", s)),
        }
    }
}

impl TryFrom<String> for SubmissionType {
    type Error = InvalidValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Moderation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(InvalidValue::new("submission status", s)),
        }
    }
}

impl TryFrom<String> for SubmissionStatus {
    type Error = InvalidValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    #[sqlx(rename = "type", try_from = "String")]
    #[serde(rename = "type")]
    pub kind: SubmissionType,
    pub title: String,
    pub content: String,
    pub author_id: String,
    #[sqlx(try_from = "String")]
    pub status: SubmissionStatus,
    pub reviewed_by: Option<String>,
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A submission joined with its author, for the moderation queue
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionWithAuthor {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub submission: Submission,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
}

/// Input for a new submission
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubmissionInput {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub content: String,
    /// Must name the signed-in user
    pub user_id: String,
}

/// Input for approving or rejecting a submission
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSubmissionInput {
    pub submission_id: String,
    pub status: String,
    #[serde(default)]
    pub note: Option<String>,
}

//! Session and verification token models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session entity for a signed-in browser
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub id: String,
    /// Opaque value carried in the `session` cookie
    pub session_token: String,
    pub user_id: String,
    pub expires: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.expires < Utc::now()
    }
}

/// Pending magic-link sign-in.
///
/// `value` holds the SHA-256 hex digest of the emailed token, never the
/// token itself.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VerificationToken {
    pub id: String,
    /// Email address the link was sent to
    pub identifier: String,
    pub value: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VerificationToken {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

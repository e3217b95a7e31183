//! User model
//!
//! Staff accounts are created on first magic-link sign-in. The role decides
//! what a signed-in user may change: staff read and submit, editors manage
//! content, admins additionally manage roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::InvalidValue;

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: Option<String>,
    /// Lowercase, unique
    pub email: String,
    pub email_verified: Option<DateTime<Utc>>,
    pub image: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// A new staff account for a verified email address.
    pub fn new_staff(email: &str) -> Self {
        let now = Utc::now();
        Self {
            id: super::new_id(),
            name: None,
            email: email.trim().to_lowercase(),
            email_verified: Some(now),
            image: None,
            role: Role::Staff,
            created_at: now,
        }
    }
}

/// User role for authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Reads content and sends submissions
    #[default]
    Staff,
    /// Manages content and moderates submissions
    Editor,
    /// Everything an editor can do, plus role management
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Staff => "staff",
            Role::Editor => "editor",
            Role::Admin => "admin",
        }
    }

    /// Editors and admins may mutate content
    pub fn is_editor(&self) -> bool {
        matches!(self, Role::Editor | Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        *self == Role::Admin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "staff" => Ok(Role::Staff),
            "editor" => Ok(Role::Editor),
            "admin" => Ok(Role::Admin),
            _ => Err(InvalidValue::new("role", s)),
        }
    }
}

/// Stored roles decode leniently: a missing or unknown value is staff
impl From<String> for Role {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            if !value.trim().is_empty() {
                tracing::warn!("Unknown stored role {:?}, treating as staff", value);
            }
            Role::Staff
        })
    }
}

/// The signed-in user as seen by request handlers and services.
///
/// Built from the session's user row on every request, so a role change is
/// visible on the user's next request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub role: Role,
}

impl SessionUser {
    pub fn is_editor(&self) -> bool {
        self.role.is_editor()
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<User> for SessionUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            image: user.image,
            role: user.role,
        }
    }
}

/// Input for changing a user's role
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleInput {
    pub user_id: String,
    pub role: String,
}

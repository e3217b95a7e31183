//! User service: role management and display names

use std::sync::Arc;

use crate::db::repositories::UserRepository;
use crate::models::{Role, SessionUser, UpdateRoleInput, User};
use crate::services::error::{OrFail, ServiceError, ServiceResult};
use crate::services::require_admin;

/// The user's name, or one derived from their email address.
///
/// `jmanio@example.com` becomes `J. Manio`.
pub fn display_name(name: Option<&str>, email: &str) -> String {
    if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }

    let local = email.split('@').next().unwrap_or_default();
    let mut chars = local.chars();
    let Some(initial) = chars.next() else {
        return "No name".to_string();
    };
    let initial: String = initial.to_uppercase().collect();

    let Some(first) = chars.next() else {
        return initial;
    };
    let surname: String = first.to_uppercase().chain(chars).collect();
    format!("{}. {}", initial, surname)
}

pub struct UserService {
    repo: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    /// All users, newest first
    pub async fn list_users(&self, actor: &SessionUser) -> ServiceResult<Vec<User>> {
        require_admin(actor)?;
        self.repo.list().await.or_fail("Failed to load users")
    }

    pub async fn update_role(&self, actor: &SessionUser, input: UpdateRoleInput) -> ServiceResult<()> {
        require_admin(actor)?;
        if input.user_id.trim().is_empty() {
            return Err(ServiceError::invalid("Invalid request"));
        }
        let role: Role = input
            .role
            .parse()
            .map_err(|_| ServiceError::invalid("Invalid request"))?;

        if !self
            .repo
            .update_role(&input.user_id, role)
            .await
            .or_fail("Failed to update user role")?
        {
            return Err(ServiceError::not_found("User not found"));
        }

        tracing::info!("{} set role of user {} to {}", actor.email, input.user_id, role);
        Ok(())
    }
}

//! User administration (admin only)
//!
//! - GET /api/admin/users
//! - PATCH /api/admin/users {userId, role}

use axum::{extract::State, routing::get, Json, Router};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::Success;
use crate::models::{UpdateRoleInput, User};

pub fn admin_router() -> Router<AppState> {
    Router::new().route("/", get(list_users).patch(update_role))
}

async fn list_users(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.users.list_users(&user).await?))
}

async fn update_role(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(input): Json<UpdateRoleInput>,
) -> Result<Success, ApiError> {
    state.users.update_role(&user, input).await?;
    Ok(Success::ok())
}

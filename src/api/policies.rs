//! Policy API endpoints
//!
//! Signed-in:
//! - GET /api/policies - Published policies
//!
//! Editor (multipart forms with an optional `file`):
//! - GET/POST /api/admin/policies
//! - GET/PUT/DELETE /api/admin/policies/{id}

use axum::{
    extract::{Multipart, Path, State},
    routing::get,
    Json, Router,
};

use crate::api::form::DocumentForm;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{Created, Success};
use crate::models::Policy;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_published))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all).post(create))
        .route("/{id}", get(get_one).put(update).delete(delete))
}

async fn list_published(State(state): State<AppState>) -> Result<Json<Vec<Policy>>, ApiError> {
    Ok(Json(state.policies.list_published().await?))
}

async fn list_all(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<Policy>>, ApiError> {
    Ok(Json(state.policies.list_all(&user).await?))
}

async fn get_one(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<Policy>, ApiError> {
    Ok(Json(state.policies.get(&user, &id).await?))
}

async fn create(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    multipart: Multipart,
) -> Result<Created, ApiError> {
    let (input, file) = DocumentForm::from_multipart(multipart).await?.into_policy();
    let created = state.policies.create(&user, input, file).await?;
    Ok(Success::created(created.id))
}

async fn update(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Success, ApiError> {
    let (input, file) = DocumentForm::from_multipart(multipart).await?.into_policy();
    state.policies.update(&user, &id, input, file).await?;
    Ok(Success::ok())
}

async fn delete(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Success, ApiError> {
    state.policies.delete(&user, &id).await?;
    Ok(Success::ok())
}

//! Announcement API endpoints
//!
//! Public:
//! - GET /api/announcements - Published announcements visible to the caller
//! - GET /api/announcements/{id}
//!
//! Editor:
//! - GET/POST /api/admin/announcements
//! - GET/PUT/DELETE /api/admin/announcements/{id}

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};
use crate::api::responses::{Created, Success};
use crate::models::{Announcement, AnnouncementInput};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_visible))
        .route("/{id}", get(get_visible))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all).post(create))
        .route("/{id}", get(get_one).put(update).delete(delete))
}

async fn list_visible(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
) -> Result<Json<Vec<Announcement>>, ApiError> {
    let list = state.announcements.list_visible(viewer.as_ref()).await?;
    Ok(Json(list))
}

async fn get_visible(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<String>,
) -> Result<Json<Announcement>, ApiError> {
    let announcement = state.announcements.get_visible(viewer.as_ref(), &id).await?;
    Ok(Json(announcement))
}

async fn list_all(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<Announcement>>, ApiError> {
    Ok(Json(state.announcements.list_all(&user).await?))
}

async fn get_one(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<Announcement>, ApiError> {
    Ok(Json(state.announcements.get(&user, &id).await?))
}

async fn create(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(input): Json<AnnouncementInput>,
) -> Result<Created, ApiError> {
    let created = state.announcements.create(&user, input).await?;
    Ok(Success::created(created.id))
}

async fn update(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
    Json(input): Json<AnnouncementInput>,
) -> Result<Success, ApiError> {
    state.announcements.update(&user, &id, input).await?;
    Ok(Success::ok())
}

async fn delete(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Success, ApiError> {
    state.announcements.delete(&user, &id).await?;
    Ok(Success::ok())
}

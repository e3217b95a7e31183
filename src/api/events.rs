//! Event API endpoints
//!
//! Signed-in:
//! - GET /api/events - Published events
//! - GET /api/events/{id}
//!
//! Editor:
//! - GET/POST /api/admin/events
//! - GET/PUT/DELETE /api/admin/events/{id}

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{Created, Success};
use crate::models::{Event, EventInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_published))
        .route("/{id}", get(get_published))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all).post(create))
        .route("/{id}", get(get_one).put(update).delete(delete))
}

async fn list_published(State(state): State<AppState>) -> Result<Json<Vec<Event>>, ApiError> {
    Ok(Json(state.events.list_published().await?))
}

async fn get_published(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Event>, ApiError> {
    Ok(Json(state.events.get_published(&id).await?))
}

async fn list_all(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<Event>>, ApiError> {
    Ok(Json(state.events.list_all(&user).await?))
}

async fn get_one(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<Event>, ApiError> {
    Ok(Json(state.events.get(&user, &id).await?))
}

async fn create(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(input): Json<EventInput>,
) -> Result<Created, ApiError> {
    let created = state.events.create(&user, input).await?;
    Ok(Success::created(created.id))
}

async fn update(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
    Json(input): Json<EventInput>,
) -> Result<Success, ApiError> {
    state.events.update(&user, &id, input).await?;
    Ok(Success::ok())
}

async fn delete(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Success, ApiError> {
    state.events.delete(&user, &id).await?;
    Ok(Success::ok())
}

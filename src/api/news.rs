//! News API endpoints
//!
//! Signed-in:
//! - GET /api/news - Published articles
//! - GET /api/news/{slug}
//!
//! Editor:
//! - GET/POST /api/admin/news
//! - GET/PUT/DELETE /api/admin/news/{id}

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{Created, Success};
use crate::models::{News, NewsInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_published))
        .route("/{slug}", get(get_by_slug))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all).post(create))
        .route("/{id}", get(get_one).put(update).delete(delete))
}

async fn list_published(State(state): State<AppState>) -> Result<Json<Vec<News>>, ApiError> {
    Ok(Json(state.news.list_published().await?))
}

async fn get_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<News>, ApiError> {
    Ok(Json(state.news.get_published(&slug).await?))
}

async fn list_all(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<News>>, ApiError> {
    Ok(Json(state.news.list_all(&user).await?))
}

async fn get_one(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<News>, ApiError> {
    Ok(Json(state.news.get(&user, &id).await?))
}

async fn create(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(input): Json<NewsInput>,
) -> Result<Created, ApiError> {
    let created = state.news.create(&user, input).await?;
    Ok(Success::created(created.id))
}

async fn update(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
    Json(input): Json<NewsInput>,
) -> Result<Success, ApiError> {
    state.news.update(&user, &id, input).await?;
    Ok(Success::ok())
}

async fn delete(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Success, ApiError> {
    state.news.delete(&user, &id).await?;
    Ok(Success::ok())
}

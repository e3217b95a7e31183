//! Download API endpoints
//!
//! Signed-in:
//! - GET /api/downloads - Published downloads
//!
//! Editor (multipart forms with a `file`, required on create):
//! - GET/POST /api/admin/downloads
//! - GET/PUT/DELETE /api/admin/downloads/{id}

use axum::{
    extract::{Multipart, Path, State},
    routing::get,
    Json, Router,
};

use crate::api::form::DocumentForm;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{Created, Success};
use crate::models::Download;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_published))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all).post(create))
        .route("/{id}", get(get_one).put(update).delete(delete))
}

async fn list_published(State(state): State<AppState>) -> Result<Json<Vec<Download>>, ApiError> {
    Ok(Json(state.downloads.list_published().await?))
}

async fn list_all(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<Download>>, ApiError> {
    Ok(Json(state.downloads.list_all(&user).await?))
}

async fn get_one(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<Download>, ApiError> {
    Ok(Json(state.downloads.get(&user, &id).await?))
}

async fn create(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    multipart: Multipart,
) -> Result<Created, ApiError> {
    let (input, file) = DocumentForm::from_multipart(multipart).await?.into_download();
    let created = state.downloads.create(&user, input, file).await?;
    Ok(Success::created(created.id))
}

async fn update(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Success, ApiError> {
    let (input, file) = DocumentForm::from_multipart(multipart).await?.into_download();
    state.downloads.update(&user, &id, input, file).await?;
    Ok(Success::ok())
}

async fn delete(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Success, ApiError> {
    state.downloads.delete(&user, &id).await?;
    Ok(Success::ok())
}

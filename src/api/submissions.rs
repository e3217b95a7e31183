//! Submission API endpoints
//!
//! Signed-in:
//! - GET /api/submissions - The caller's own submissions
//! - POST /api/submissions
//!
//! Editor:
//! - GET /api/admin/submissions - Moderation queue with author details
//! - PATCH /api/admin/submissions - Approve or reject

use axum::{extract::State, routing::get, Json, Router};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{Created, Success};
use crate::models::{CreateSubmissionInput, ReviewSubmissionInput, Submission, SubmissionWithAuthor};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_mine).post(create))
}

pub fn admin_router() -> Router<AppState> {
    Router::new().route("/", get(list_all).patch(review))
}

async fn list_mine(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<Submission>>, ApiError> {
    Ok(Json(state.submissions.list_mine(&user).await?))
}

async fn create(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(input): Json<CreateSubmissionInput>,
) -> Result<Created, ApiError> {
    let created = state.submissions.create(&user, input).await?;
    Ok(Success::created(created.id))
}

async fn list_all(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<SubmissionWithAuthor>>, ApiError> {
    Ok(Json(state.submissions.list_all(&user).await?))
}

async fn review(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(input): Json<ReviewSubmissionInput>,
) -> Result<Success, ApiError> {
    state.submissions.review(&user, input).await?;
    Ok(Success::ok())
}

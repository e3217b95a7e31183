//! Page data endpoints
//!
//! - GET /api/health
//! - GET /api/home - Public home page
//! - GET /api/dashboard - Staff dashboard (signed-in)
//! - GET /api/admin - Content counts (editor)

use axum::{extract::State, routing::get, Json, Router};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::HealthResponse;
use crate::services::{AdminStats, DashboardData, HomeData};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/home", get(home))
}

pub fn protected_router() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}

pub fn admin_router() -> Router<AppState> {
    Router::new().route("/", get(admin_stats))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.pool.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!("Health check ping failed: {:#}", e);
            "disconnected"
        }
    };
    Json(HealthResponse {
        status: "ok",
        database,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn home(State(state): State<AppState>) -> Result<Json<HomeData>, ApiError> {
    Ok(Json(state.dashboard.home().await?))
}

async fn dashboard(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<DashboardData>, ApiError> {
    Ok(Json(state.dashboard.dashboard(&user).await?))
}

async fn admin_stats(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<AdminStats>, ApiError> {
    Ok(Json(state.dashboard.admin_stats(&user).await?))
}

//! API layer - HTTP handlers and routing
//!
//! Everything is served as JSON under `/api`:
//! - Auth endpoints (magic link sign-in, session, sign-out)
//! - Public home page data, announcements and search
//! - Staff pages: dashboard, news, events, policies, downloads, submissions
//! - Editor administration under `/api/admin`
//! - User administration (admin only)
//!
//! Uploaded documents are served statically under the upload prefix.

pub mod announcements;
pub mod auth;
pub mod downloads;
pub mod events;
pub mod form;
pub mod home;
pub mod middleware;
pub mod news;
pub mod policies;
pub mod responses;
pub mod search;
pub mod submissions;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub use middleware::{ApiError, AppState};

/// Room for the text fields of a multipart form on top of the file itself
const FORM_OVERHEAD: usize = 64 * 1024;

/// Build the router mounted at `/api`
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin only
    let admin_routes = Router::new()
        .nest("/admin/users", users::admin_router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Editors and admins
    let body_limit = usize::try_from(state.config.upload.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(FORM_OVERHEAD);
    let editor_routes = Router::new()
        .nest("/admin", home::admin_router())
        .nest("/admin/announcements", announcements::admin_router())
        .nest("/admin/news", news::admin_router())
        .nest("/admin/events", events::admin_router())
        .nest("/admin/policies", policies::admin_router())
        .nest("/admin/downloads", downloads::admin_router())
        .nest("/admin/submissions", submissions::admin_router())
        .layer(DefaultBodyLimit::max(body_limit))
        .route_layer(axum_middleware::from_fn(middleware::require_editor))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Any signed-in user
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .merge(home::protected_router())
        .nest("/news", news::router())
        .nest("/events", events::router())
        .nest("/policies", policies::router())
        .nest("/downloads", downloads::router())
        .nest("/submissions", submissions::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public
    Router::new()
        .merge(home::public_router())
        .nest("/auth", auth::public_router())
        .nest("/announcements", announcements::public_router())
        .nest("/search", search::router())
        .merge(admin_routes)
        .merge(editor_routes)
        .merge(protected_routes)
}

/// Build the complete application router
pub fn build_router(state: AppState) -> Router {
    let mut cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);
    match state.config.server.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(_) => tracing::warn!(
            "Ignoring invalid CORS origin {:?}",
            state.config.server.cors_origin
        ),
    }

    let upload = &state.config.upload;
    let uploads = ServeDir::new(&upload.path);

    Router::new()
        .nest("/api", build_api_router(state.clone()))
        .nest_service(&upload.public_prefix, uploads)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

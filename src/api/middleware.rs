//! API middleware and shared request plumbing
//!
//! - `AppState`: the services every handler reaches through `State`
//! - `ApiError`: `{ "success": false, "error": ... }` with a matching status
//! - Session extraction (`session` cookie or `Authorization: Bearer`)
//! - Route guards for signed-in users, editors and admins

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::cache::{create_page_cache, SharedPageCache};
use crate::config::Config;
use crate::db::repositories::*;
use crate::db::DynDatabasePool;
use crate::models::SessionUser;
use crate::services::dashboard::DashboardRepos;
use crate::services::{
    AnnouncementService, AuthService, ClientInfo, DashboardService, DownloadService, DynMailer,
    EmailService, EventService, NewsService, PolicyService, SearchService, ServiceError,
    SubmissionService, UploadService, UserService,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: DynDatabasePool,
    pub cache: SharedPageCache,
    pub auth: Arc<AuthService>,
    pub announcements: Arc<AnnouncementService>,
    pub news: Arc<NewsService>,
    pub events: Arc<EventService>,
    pub policies: Arc<PolicyService>,
    pub downloads: Arc<DownloadService>,
    pub submissions: Arc<SubmissionService>,
    pub users: Arc<UserService>,
    pub search: Arc<SearchService>,
    pub dashboard: Arc<DashboardService>,
}

impl AppState {
    /// Wire repositories and services over `pool`
    pub fn new(config: Config, pool: DynDatabasePool, mailer: DynMailer) -> anyhow::Result<Self> {
        let cache = create_page_cache(&config.cache);
        let email = Arc::new(EmailService::new(
            mailer,
            &config.server.site_name,
            &config.server.base_url,
            config.email.notify_address.clone(),
        )?);
        let uploads = Arc::new(UploadService::local(config.upload.clone()));

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let announcement_repo = SqlxAnnouncementRepository::boxed(pool.clone());
        let news_repo = SqlxNewsRepository::boxed(pool.clone());
        let event_repo = SqlxEventRepository::boxed(pool.clone());
        let policy_repo = SqlxPolicyRepository::boxed(pool.clone());
        let download_repo = SqlxDownloadRepository::boxed(pool.clone());
        let submission_repo = SqlxSubmissionRepository::boxed(pool.clone());

        let auth = Arc::new(AuthService::new(
            user_repo.clone(),
            SqlxSessionRepository::boxed(pool.clone()),
            SqlxVerificationRepository::boxed(pool.clone()),
            email.clone(),
            config.auth.clone(),
            &config.server.base_url,
        ));

        let dashboard = Arc::new(DashboardService::new(
            DashboardRepos {
                announcements: announcement_repo.clone(),
                news: news_repo.clone(),
                events: event_repo.clone(),
                policies: policy_repo.clone(),
                downloads: download_repo.clone(),
                submissions: submission_repo.clone(),
                users: user_repo.clone(),
            },
            cache.clone(),
        ));

        Ok(Self {
            auth,
            announcements: Arc::new(AnnouncementService::new(announcement_repo, cache.clone())),
            news: Arc::new(NewsService::new(news_repo.clone(), cache.clone())),
            events: Arc::new(EventService::new(event_repo.clone(), cache.clone())),
            policies: Arc::new(PolicyService::new(policy_repo.clone(), uploads.clone(), cache.clone())),
            downloads: Arc::new(DownloadService::new(download_repo, uploads, cache.clone())),
            submissions: Arc::new(SubmissionService::new(submission_repo, user_repo.clone(), email)),
            users: Arc::new(UserService::new(user_repo)),
            search: Arc::new(SearchService::new(news_repo, policy_repo, event_repo)),
            dashboard,
            cache,
            pool,
            config: Arc::new(config),
        })
    }
}

/// Error body for failed requests
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    success: bool,
    pub error: String,
    #[serde(skip)]
    retry_after: Option<i64>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            success: false,
            error: message.into(),
            retry_after: None,
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::Unauthorized => Self::unauthorized(),
            ServiceError::InvalidInput(_) => Self::validation_error(message),
            ServiceError::NotFound(_) => Self::not_found(message),
            ServiceError::RateLimited { retry_after } => Self {
                retry_after: Some(retry_after),
                ..Self::new(StatusCode::TOO_MANY_REQUESTS, message)
            },
            ServiceError::Failed(_) => Self::internal_error(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        let retry_after = self.retry_after;
        let mut response = (status, Json(self)).into_response();
        if let Some(seconds) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Session token from `Authorization: Bearer` or the `session` cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = auth.strip_prefix("Bearer ") {
            return Some(token.trim().to_string());
        }
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|cookie| cookie.trim().strip_prefix("session=").map(str::to_string))
        .filter(|token| !token.is_empty())
}

/// The signed-in user, placed in request extensions by `require_auth`
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub SessionUser);

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(ApiError::unauthorized)
    }
}

/// The signed-in user on routes that also serve anonymous visitors
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<SessionUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(Self(Some(user.0.clone())));
        }
        let Some(token) = extract_session_token(&parts.headers) else {
            return Ok(Self(None));
        };
        Ok(Self(state.auth.resolve_session(&token).await?))
    }
}

/// Caller's address and user agent.
///
/// The first `X-Forwarded-For` hop is used only when `server.trust_proxy`
/// is set; otherwise the socket address is authoritative.
#[derive(Debug, Clone)]
pub struct Client(pub ClientInfo);

impl FromRequestParts<AppState> for Client {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let socket = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(Self(ClientInfo {
            ip: client_ip(&parts.headers, socket, state.config.server.trust_proxy),
            user_agent,
        }))
    }
}

fn client_ip(headers: &HeaderMap, socket: Option<IpAddr>, trust_proxy: bool) -> Option<IpAddr> {
    if !trust_proxy {
        return socket;
    }
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse::<IpAddr>().ok())
        .or(socket)
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers()).ok_or_else(ApiError::unauthorized)?;

    let user = state
        .auth
        .resolve_session(&token)
        .await?
        .ok_or_else(ApiError::unauthorized)?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Editor (or admin) authorization middleware
pub async fn require_editor(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(ApiError::unauthorized)?;

    if !user.0.is_editor() {
        return Err(ApiError::unauthorized());
    }
    Ok(next.run(request).await)
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(ApiError::unauthorized)?;

    if !user.0.is_admin() {
        return Err(ApiError::unauthorized());
    }
    Ok(next.run(request).await)
}

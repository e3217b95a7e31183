//! Authentication API endpoints
//!
//! - POST /api/auth/magic-link - Email a sign-in link
//! - GET /api/auth/magic-link/verify - Follow the link, set the session cookie
//! - GET /api/auth/session - Current user
//! - POST /api/auth/sign-out - End the session

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{extract_session_token, ApiError, AppState, AuthenticatedUser, Client};
use crate::api::responses::Success;
use crate::models::SessionUser;

#[derive(Debug, Deserialize)]
pub struct MagicLinkRequest {
    pub email: String,
    #[serde(default, rename = "callbackURL")]
    pub callback_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(default)]
    pub token: String,
    #[serde(default, rename = "callbackURL")]
    pub callback_url: Option<String>,
}

/// Build public auth routes (no session required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/magic-link", post(request_magic_link))
        .route("/magic-link/verify", get(verify_magic_link))
}

/// Build protected auth routes
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/session", get(current_session))
        .route("/sign-out", post(sign_out))
}

fn session_cookie(token: &str, max_age: i64, secure: bool) -> String {
    let mut cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        token, max_age
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// POST /api/auth/magic-link
async fn request_magic_link(
    State(state): State<AppState>,
    Client(client): Client,
    Json(body): Json<MagicLinkRequest>,
) -> Result<Success, ApiError> {
    state
        .auth
        .request_magic_link(&body.email, body.callback_url.as_deref(), &client)
        .await?;
    Ok(Success::ok())
}

/// GET /api/auth/magic-link/verify?token=&callbackURL=
///
/// Sets the session cookie and redirects to the callback. Untrusted
/// callbacks fall back to `/`.
async fn verify_magic_link(
    State(state): State<AppState>,
    Client(client): Client,
    Query(query): Query<VerifyQuery>,
) -> Result<Response, ApiError> {
    let sign_in = state.auth.verify_magic_link(&query.token, &client).await?;

    let target = query
        .callback_url
        .filter(|url| state.auth.is_trusted_callback(url))
        .unwrap_or_else(|| "/".to_string());

    let cookie = session_cookie(
        &sign_in.session_token,
        state.auth.session_max_age_secs(),
        state.auth.secure_cookies(),
    );
    let cookie = HeaderValue::from_str(&cookie)
        .map_err(|_| ApiError::internal_error("Failed to sign in"))?;
    let location = HeaderValue::from_str(&target)
        .map_err(|_| ApiError::validation_error("Invalid callback URL"))?;

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, cookie);
    headers.insert(header::LOCATION, location);
    Ok((StatusCode::SEE_OTHER, headers).into_response())
}

/// GET /api/auth/session
async fn current_session(AuthenticatedUser(user): AuthenticatedUser) -> Json<SessionUser> {
    Json(user)
}

/// POST /api/auth/sign-out
async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    if let Some(token) = extract_session_token(&headers) {
        state.auth.sign_out(&token).await?;
    }

    let clear = session_cookie("", 0, state.auth.secure_cookies());
    let mut response = Success::ok().into_response();
    if let Ok(value) = HeaderValue::from_str(&clear) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie() {
        assert_eq!(
            session_cookie("abc", 604800, false),
            "session=abc; Path=/; HttpOnly; SameSite=Lax; Max-Age=604800"
        );
        assert!(session_cookie("abc", 10, true).ends_with("; Secure"));
    }
}

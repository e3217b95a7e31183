//! Response bodies shared by the handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Body of a successful mutation: `{ "success": true }`, plus the id of a
/// newly created row
#[derive(Debug, Clone, Serialize)]
pub struct Success {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Success {
    pub fn ok() -> Self {
        Self {
            success: true,
            id: None,
        }
    }

    /// 201 with the new row's id
    pub fn created(id: impl Into<String>) -> Created {
        Created(Self {
            success: true,
            id: Some(id.into()),
        })
    }
}

impl IntoResponse for Success {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// A `Success` sent with `201 Created`
#[derive(Debug, Clone)]
pub struct Created(pub Success);

impl IntoResponse for Created {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self.0)).into_response()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_bodies() {
        assert_eq!(
            serde_json::to_value(Success::ok()).unwrap(),
            serde_json::json!({ "success": true })
        );
        let created = Success::created("abc");
        assert_eq!(
            serde_json::to_value(&created.0).unwrap(),
            serde_json::json!({ "success": true, "id": "abc" })
        );
        assert_eq!(created.into_response().status(), StatusCode::CREATED);
    }
}

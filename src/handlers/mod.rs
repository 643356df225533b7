pub mod items;
pub mod locations;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::form_urlencoded;

use crate::errors::ServiceError;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Body returned by mutations: the status reason phrase.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

pub fn message_response(status: StatusCode) -> Response {
    let body = MessageResponse {
        message: status.canonical_reason().unwrap_or("OK").to_string(),
    };
    (status, Json(body)).into_response()
}

/// `?tags=a,b` query. An empty value means no tag filter.
#[derive(Debug, Default)]
pub struct TagsQuery {
    pub tags: Option<String>,
}

impl TagsQuery {
    /// Reads `tags` from a raw query string. A repeated key keeps its first value.
    pub fn from_raw(raw: Option<&str>) -> Self {
        let tags = raw.and_then(|query| {
            form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == "tags")
                .map(|(_, value)| value.into_owned())
        });
        Self { tags }
    }

    pub fn tag_filter(&self) -> Option<Vec<String>> {
        let tags: Vec<String> = self
            .tags
            .as_deref()?
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        (!tags.is_empty()).then_some(tags)
    }
}

/// Unwraps a JSON body, turning extractor rejections into `400 Bad Request`.
pub fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServiceError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ServiceError::BadRequest(rejection.body_text()))
}

/// Basic liveness probe
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "up",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

pub async fn not_found() -> ServiceError {
    ServiceError::NotFound("no such route".into())
}

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use pantry_api::{
    auth::{Authenticator, Claims, JwtAuthenticator},
    build_router,
    config::AppConfig,
    repositories::{InMemoryRepository, Repository},
    AppState,
};

pub const TEST_JWT_SECRET: &str = "pantry-test-secret-with-at-least-32-chars";

/// Router wired to a fresh in-memory store.
pub struct TestApp {
    pub router: Router,
    pub repo: Arc<InMemoryRepository>,
}

/// Decoded response: status, headers and JSON body (`Null` when empty).
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Same app with bearer authentication in front of the API routes.
    pub fn with_auth() -> Self {
        let authenticator: Arc<dyn Authenticator> =
            Arc::new(JwtAuthenticator::new(TEST_JWT_SECRET, None, None));
        Self::build(Some(authenticator))
    }

    fn build(authenticator: Option<Arc<dyn Authenticator>>) -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let state = AppState::new(repo.clone() as Arc<dyn Repository>);
        let router = build_router(state, &AppConfig::default(), authenticator);
        Self { router, repo }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
        self.request_with_headers(method, uri, body, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read response body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Creates a location and returns its generated id.
    pub async fn seed_location(&self, name: &str) -> String {
        self.repo
            .create_location(name)
            .await
            .expect("failed to seed location")
            .id
    }
}

pub fn item_body(name: &str, location_id: Option<&str>) -> Value {
    json!({
        "name": name,
        "type": "food",
        "tags": ["veg"],
        "price": 250,
        "imageUrl": null,
        "boughtAt": Utc::now().to_rfc3339(),
        "openedAt": null,
        "expiresAt": (Utc::now() + Duration::days(10)).to_rfc3339(),
        "lifespan": null,
        "locationId": location_id,
    })
}

pub fn bearer_token(secret: &str, ttl: Duration) -> String {
    let claims = Claims {
        sub: "tester".into(),
        exp: (Utc::now() + ttl).timestamp(),
        iss: None,
        aud: None,
        email: Some("tester@example.com".into()),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to sign token")
}

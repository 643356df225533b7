//! Pantry API Library
//!
//! Locations, the items stored in them, and the expiry notification job.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod models;
pub mod notifications;
pub mod repositories;
pub mod services;
pub mod telemetry;
pub mod validation;

use axum::{
    http::{HeaderName, HeaderValue, Method},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::auth::{auth_middleware, Authenticator, JwtAuthenticator};
use crate::config::AppConfig;
use crate::repositories::Repository;
use crate::validation::InputValidator;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub validator: Arc<InputValidator>,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self {
            repo,
            validator: Arc::new(InputValidator::new()),
        }
    }
}

/// Builds the HTTP application, enabling bearer authentication when configured.
pub fn app_router(state: AppState, config: &AppConfig) -> Router {
    let authenticator: Option<Arc<dyn Authenticator>> = if config.auth_enabled {
        info!("Bearer authentication enabled");
        Some(Arc::new(JwtAuthenticator::new(
            config.jwt_secret.as_deref().unwrap_or_default(),
            config.auth_issuer.as_deref(),
            config.auth_audience.as_deref(),
        )))
    } else {
        warn!("Authentication disabled; API is open");
        None
    };
    build_router(state, config, authenticator)
}

/// Same as [`app_router`] with an explicit authenticator.
pub fn build_router(
    state: AppState,
    config: &AppConfig,
    authenticator: Option<Arc<dyn Authenticator>>,
) -> Router {
    let mut api = Router::new()
        .nest("/locations", handlers::locations::router())
        .nest("/items", handlers::items::router());

    if let Some(authenticator) = authenticator {
        api = api.route_layer(axum::middleware::from_fn_with_state(
            authenticator,
            auth_middleware,
        ));
    }

    Router::new()
        .route("/health", get(handlers::health))
        .merge(api)
        .fallback(handlers::not_found)
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http().make_span_with(telemetry::RequestSpanMaker))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    let headers: Vec<HeaderName> = config
        .cors_headers()
        .iter()
        .filter_map(|name| HeaderName::from_bytes(name.as_bytes()).ok())
        .collect();
    let allow_headers = if headers.is_empty() {
        AllowHeaders::any()
    } else {
        AllowHeaders::list(headers)
    };

    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(allow_headers);

    if !origins.is_empty() {
        info!("CORS configured with {} allowed origin(s)", origins.len());
        base.allow_origin(origins)
    } else if config.is_development() {
        info!("No CORS origins configured; allowing any origin in development");
        base.allow_origin(Any)
    } else {
        warn!("No CORS origins configured; cross-origin requests will be rejected");
        base
    }
}

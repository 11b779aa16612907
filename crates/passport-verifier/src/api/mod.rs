//! API module for the verification service

pub mod error;
pub mod handlers;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use handlers::AppState;

/// Largest accepted request body; artifacts travel base64-encoded
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Readiness check response
#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub revocation_feed: Option<String>,
    pub feed_authenticated: bool,
    pub manifest_base_url: Option<String>,
    pub require_revocation_check: bool,
}

/// Health check endpoint
///
/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// Readiness check endpoint
///
/// GET /ready
pub async fn ready(State(state): State<Arc<AppState>>) -> Json<ReadyResponse> {
    let config = state.verifier.config();
    Json(ReadyResponse {
        ready: true,
        revocation_feed: config.revocation_feed_url.clone(),
        feed_authenticated: config.revocation_authority_key.is_some(),
        manifest_base_url: config.manifest_base_url.clone(),
        require_revocation_check: config.require_revocation_check,
    })
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS configuration for browser-based viewers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Verification endpoints
        .route("/v1/verify", post(handlers::verify_artifact))
        .route("/v1/verify/batch", post(handlers::verify_batch))
        // Trust endpoints
        .route("/v1/keys/{key_id}/status", get(handlers::key_status))
        // Interoperability
        .route("/v1/canonicalize", post(handlers::canonicalize))
        // Middleware
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

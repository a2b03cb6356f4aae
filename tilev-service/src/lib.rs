//! tilev Service Library
//!
//! HTTP handlers and types for the terrain elevation service.
//! This library is used by both the tilev-service binary and integration tests.

pub mod handlers;

use std::sync::Arc;

use axum::{routing::get, Router};
use tilev::ElevationResolver;

/// Application state shared across handlers.
pub struct AppState {
    /// Resolver for elevation queries. Its tile cache is shared by all requests.
    pub resolver: ElevationResolver,
}

/// API routes, without documentation or middleware layers.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/elevation",
            get(handlers::get_elevation).post(handlers::post_elevation),
        )
        .route("/health", get(handlers::health_check))
        .route("/stats", get(handlers::get_stats))
        .with_state(state)
}

// Re-export commonly used types for convenience
pub use handlers::{
    BatchElevationRequest, BatchElevationResponse, ElevationQuery, ElevationResponse,
    ErrorResponse, HealthResponse, StatsResponse,
};

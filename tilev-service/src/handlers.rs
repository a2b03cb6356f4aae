//! HTTP request handlers for the elevation service.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use geojson::Geometry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tilev::{ElevationError, LatLng};
use utoipa::{IntoParams, ToSchema};

use crate::AppState;

/// Query parameters for elevation endpoint.
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ElevationQuery {
    /// Latitude in decimal degrees (-90 to 90).
    pub lat: f64,
    /// Longitude in decimal degrees (-180 to 180).
    pub lon: f64,
}

/// Successful elevation response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ElevationResponse {
    /// Elevation in meters.
    pub elevation: f32,
    /// Latitude queried.
    pub lat: f64,
    /// Longitude queried.
    pub lon: f64,
}

/// Batch query: a list of `[lat, lon]` pairs.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BatchElevationRequest {
    /// Points as `[lat, lon]`, in decimal degrees.
    #[schema(value_type = Vec<Vec<f64>>)]
    pub points: Vec<[f64; 2]>,
}

/// Elevations of a batch query, in request order.
#[derive(Debug, Serialize, ToSchema)]
pub struct BatchElevationResponse {
    /// Elevation in meters of each requested point.
    pub elevations: Vec<f32>,
}

/// Body of `POST /elevation`.
///
/// Anything that is not a `{"points": ...}` object is read as a GeoJSON
/// geometry.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PostElevationBody {
    Points(BatchElevationRequest),
    Geometry(Geometry),
}

/// Error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
}

/// Cache statistics response.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    /// Number of tiles in cache.
    pub cached_tiles: u64,
    /// Maximum number of tiles the cache holds.
    pub cache_capacity: usize,
    /// Cache hit count.
    pub cache_hits: u64,
    /// Cache miss count.
    pub cache_misses: u64,
    /// Tile requests sent to the tile source.
    pub tile_fetches: u64,
    /// Misses that waited on another request's fetch.
    pub coalesced_requests: u64,
    /// Cache hit rate (0.0 to 1.0).
    pub hit_rate: f64,
}

/// Get elevation for given coordinates.
#[utoipa::path(
    get,
    path = "/elevation",
    tag = "elevation",
    params(ElevationQuery),
    responses(
        (status = 200, description = "Elevation found", body = ElevationResponse),
        (status = 400, description = "Invalid coordinates", body = ErrorResponse),
        (status = 502, description = "Tile could not be fetched or decoded", body = ErrorResponse)
    )
)]
pub async fn get_elevation(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ElevationQuery>,
) -> Response {
    tracing::debug!(lat = query.lat, lon = query.lon, "Elevation query");

    match state.resolver.get_elevation(query.lat, query.lon).await {
        Ok(elevation) => {
            tracing::info!(
                lat = query.lat,
                lon = query.lon,
                elevation = elevation,
                "Elevation found"
            );
            (
                StatusCode::OK,
                Json(ElevationResponse {
                    elevation,
                    lat: query.lat,
                    lon: query.lon,
                }),
            )
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Batch elevation query.
///
/// Accepts either `{"points": [[lat, lon], ...]}`, answered with
/// `{"elevations": [...]}`, or a GeoJSON geometry, answered with the same
/// geometry where every position carries its elevation as Z.
#[utoipa::path(
    post,
    path = "/elevation",
    tag = "elevation",
    request_body(
        content = BatchElevationRequest,
        description = "Points as [lat, lon] pairs, or a GeoJSON geometry"
    ),
    responses(
        (status = 200, description = "Elevations in request order, or the enriched geometry", body = BatchElevationResponse),
        (status = 400, description = "Invalid coordinates", body = ErrorResponse),
        (status = 502, description = "Tile could not be fetched or decoded", body = ErrorResponse)
    )
)]
pub async fn post_elevation(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PostElevationBody>,
) -> Response {
    match body {
        PostElevationBody::Points(request) => {
            let points: Vec<LatLng> = request
                .points
                .iter()
                .map(|&[lat, lon]| LatLng::new(lat, lon))
                .collect();
            tracing::debug!(points = points.len(), "Batch elevation query");

            match state.resolver.get_elevations(&points).await {
                Ok(elevations) => {
                    (StatusCode::OK, Json(BatchElevationResponse { elevations })).into_response()
                }
                Err(e) => error_response(e),
            }
        }
        PostElevationBody::Geometry(geometry) => {
            tracing::debug!("Geometry elevation query");

            match tilev::geojson::add_elevations_to_geometry(&state.resolver, geometry).await {
                Ok(enriched) => (StatusCode::OK, Json(enriched)).into_response(),
                Err(e) => error_response(e),
            }
        }
    }
}

/// HTTP status for a resolver error.
fn status_for(e: &ElevationError) -> StatusCode {
    match e {
        ElevationError::InvalidCoordinate { .. } => StatusCode::BAD_REQUEST,
        ElevationError::TileFetch { .. } | ElevationError::Decode { .. } => {
            StatusCode::BAD_GATEWAY
        }
        ElevationError::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Create an error response for elevation queries.
fn error_response(e: ElevationError) -> Response {
    let status = status_for(&e);
    tracing::warn!(status = status.as_u16(), error = %e, "Elevation query failed");

    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

/// Health check endpoint.
///
/// Returns service status and version.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses((status = 200, description = "Service is healthy", body = HealthResponse))
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Get cache statistics.
#[utoipa::path(
    get,
    path = "/stats",
    tag = "system",
    responses((status = 200, description = "Tile cache statistics", body = StatsResponse))
)]
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let stats = state.resolver.cache_stats();

    Json(StatsResponse {
        cached_tiles: stats.entry_count,
        cache_capacity: state.resolver.cache_capacity(),
        cache_hits: stats.hit_count,
        cache_misses: stats.miss_count,
        tile_fetches: stats.fetch_count,
        coalesced_requests: stats.coalesced_count,
        hit_rate: stats.hit_rate(),
    })
}

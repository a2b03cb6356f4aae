//! tilev Service - HTTP microservice for terrain elevation queries.
//!
//! A REST API for querying elevation from tiled height-map imagery.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `TILEV_URL_TEMPLATE` | Tile URL template with `{x}`, `{y}`, `{z}` | Required |
//! | `TILEV_ZOOM` | Zoom level of the tile set | 12 |
//! | `TILEV_TILE_SIZE` | Tile edge length in pixels | 256 |
//! | `TILEV_CACHE_SIZE` | Maximum tiles in cache | 100 |
//! | `TILEV_ENCODING` | `terrain-rgb` or `terrarium` | terrain-rgb |
//! | `TILEV_DATA_DIR` | Serve tiles from this directory instead of HTTP | None |
//! | `TILEV_PRELOAD` | Bounding boxes to fetch at startup | None |
//! | `TILEV_PORT` | HTTP server port | 8080 |
//! | `RUST_LOG` | Log level (e.g., "info", "debug") | "info" |
//!
//! ## Endpoints
//!
//! - `GET /elevation?lat=X&lon=Y` - Get elevation at coordinates
//! - `POST /elevation` - Batch query with a list of points or a GeoJSON geometry
//! - `GET /health` - Health check
//! - `GET /stats` - Cache statistics
//! - `GET /docs` - OpenAPI documentation (Swagger UI)

use std::net::SocketAddr;
use std::sync::Arc;

use tilev::{BoundingBox, ElevationResolverBuilder};
use tilev_service::{handlers, router, AppState};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation for the tilev service.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "tilev Elevation Service",
        version = "0.1.0",
        description = "REST API for querying terrain elevation from map tiles.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(
        handlers::get_elevation,
        handlers::post_elevation,
        handlers::health_check,
        handlers::get_stats,
    ),
    components(
        schemas(
            handlers::ElevationQuery,
            handlers::ElevationResponse,
            handlers::BatchElevationRequest,
            handlers::BatchElevationResponse,
            handlers::ErrorResponse,
            handlers::HealthResponse,
            handlers::StatsResponse,
        )
    ),
    tags(
        (name = "elevation", description = "Elevation query endpoints"),
        (name = "system", description = "System and health endpoints")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tilev_service=info,tilev=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load port from environment (service-specific config)
    let port: u16 = std::env::var("TILEV_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);

    // The library reads TILEV_URL_TEMPLATE, TILEV_ZOOM, TILEV_TILE_SIZE,
    // TILEV_CACHE_SIZE, TILEV_ENCODING and TILEV_DATA_DIR
    let resolver = ElevationResolverBuilder::from_env()?.build()?;

    tracing::info!(
        zoom = resolver.zoom(),
        tile_size = resolver.tile_size(),
        projection = resolver.projection_name(),
        cache_capacity = resolver.cache_capacity(),
        port = port,
        "Starting tilev service"
    );

    if let Ok(preload_val) = std::env::var("TILEV_PRELOAD") {
        let boxes = parse_preload_bounds(&preload_val);
        tracing::info!(boxes = boxes.len(), "Preloading tiles into cache");
        for bounds in &boxes {
            match resolver.preload(bounds).await {
                Ok(stats) => tracing::info!(
                    tiles_loaded = stats.tiles_loaded,
                    tiles_already_cached = stats.tiles_already_cached,
                    tiles_failed = stats.tiles_failed,
                    tiles_matched = stats.tiles_matched,
                    elapsed_ms = stats.elapsed_ms,
                    "Preload complete"
                ),
                Err(e) => tracing::warn!(error = %e, "Preload skipped"),
            }
        }
    }

    let state = Arc::new(AppState { resolver });

    // Build router
    let app = router(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        );

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Parse the `TILEV_PRELOAD` environment variable value into bounding boxes.
///
/// Format: `min_lat,min_lon,max_lat,max_lon`, several boxes separated by `;`.
/// Malformed boxes are skipped with a warning.
fn parse_preload_bounds(value: &str) -> Vec<BoundingBox> {
    value
        .trim()
        .split(';')
        .filter(|s| !s.trim().is_empty())
        .filter_map(|bbox_str| {
            let parts: Vec<f64> = bbox_str
                .split(',')
                .filter_map(|s| s.trim().parse::<f64>().ok())
                .collect();
            if parts.len() == 4 {
                Some(BoundingBox::new(parts[0], parts[1], parts[2], parts[3]))
            } else {
                tracing::warn!(
                    bbox = bbox_str,
                    "Invalid bounding box format, expected min_lat,min_lon,max_lat,max_lon"
                );
                None
            }
        })
        .collect()
}

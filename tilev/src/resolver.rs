//! Batch elevation resolver.
//!
//! This module provides [`ElevationResolver`], the high-level entry point:
//! give it one coordinate or many and it returns elevations in the same
//! shape and order.
//!
//! Points are grouped by tile, every distinct tile is fetched concurrently,
//! and each point is then read from its tile with nearest-neighbor sampling.
//!
//! ```ignore
//! use tilev::{ElevationResolverBuilder, LatLng};
//!
//! let resolver = ElevationResolverBuilder::new(
//!     "https://api.example.com/v4/terrain/{z}/{x}/{y}.pngraw",
//! )
//! .zoom(12)
//! .cache_size(100)
//! .build()?;
//!
//! // Single point in, single elevation out
//! let elevation = resolver.get_elevation(35.3606, 138.7274).await?;
//!
//! // Many points in, many elevations out (same order)
//! let path = vec![LatLng::new(35.36, 138.72), LatLng::new(35.37, 138.73)];
//! let profile = resolver.get_elevations(&path).await?;
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::addressing::{address, grid_dimensions, TileAddress, TileIndex};
use crate::decode::{Decoder, Encoding};
use crate::error::{ElevationError, Result};
use crate::fetcher::{CacheStats, TileFetcher};
use crate::projection::{Projection, WebMercator};
use crate::template::UrlTemplate;
use crate::tile::{TileData, DEFAULT_TILE_SIZE};
use crate::transport::{FileTransport, TileTransport};

/// Default zoom level.
pub const DEFAULT_ZOOM: u8 = 12;

/// Default number of cached tiles.
pub const DEFAULT_CACHE_SIZE: usize = 100;

/// Highest supported zoom level.
pub const MAX_ZOOM: u8 = 30;

/// Largest number of tiles a single [`ElevationResolver::preload`] covers.
pub const MAX_PRELOAD_TILES: u64 = 4096;

/// Tile fetches a preload keeps in flight at once.
const PRELOAD_CONCURRENCY: usize = 16;

/// A geographic coordinate in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lon: f64,
}

impl LatLng {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl From<(f64, f64)> for LatLng {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

/// Input of [`ElevationResolver::resolve`]: one point or a list.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Single(LatLng),
    Many(Vec<LatLng>),
}

impl From<LatLng> for Query {
    fn from(point: LatLng) -> Self {
        Query::Single(point)
    }
}

impl From<(f64, f64)> for Query {
    fn from(point: (f64, f64)) -> Self {
        Query::Single(point.into())
    }
}

impl From<Vec<LatLng>> for Query {
    fn from(points: Vec<LatLng>) -> Self {
        Query::Many(points)
    }
}

impl From<&[LatLng]> for Query {
    fn from(points: &[LatLng]) -> Self {
        Query::Many(points.to_vec())
    }
}

impl From<Vec<(f64, f64)>> for Query {
    fn from(points: Vec<(f64, f64)>) -> Self {
        Query::Many(points.into_iter().map(LatLng::from).collect())
    }
}

/// Output of [`ElevationResolver::resolve`], shaped like the [`Query`].
#[derive(Debug, Clone, PartialEq)]
pub enum Elevations {
    Single(f32),
    Many(Vec<f32>),
}

impl Elevations {
    /// The elevations as a list, whatever the shape.
    pub fn into_vec(self) -> Vec<f32> {
        match self {
            Elevations::Single(value) => vec![value],
            Elevations::Many(values) => values,
        }
    }
}

/// A geographic bounding box for preloading tiles.
///
/// Coordinates are in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum latitude (southern boundary).
    pub min_lat: f64,
    /// Minimum longitude (western boundary).
    pub min_lon: f64,
    /// Maximum latitude (northern boundary).
    pub max_lat: f64,
    /// Maximum longitude (eastern boundary).
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }
}

/// Statistics from a preload operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadStats {
    /// Number of tiles covered by the bounding box.
    pub tiles_matched: u64,
    /// Number of tiles fetched into the cache.
    pub tiles_loaded: u64,
    /// Number of tiles that were already cached.
    pub tiles_already_cached: u64,
    /// Number of tiles that failed to fetch or decode.
    pub tiles_failed: u64,
    /// Total elapsed time in milliseconds.
    pub elapsed_ms: u64,
}

/// Point indices grouped by the tile they fall in, in tile order.
type TileGroups = BTreeMap<TileIndex, Vec<(usize, TileAddress)>>;

/// Resolves elevations for geographic coordinates from an elevation tile
/// set.
///
/// The resolver is `Send + Sync`; wrap it in an [`Arc`] to share one cache
/// between tasks.
///
/// # Example
///
/// ```ignore
/// use tilev::{Elevations, ElevationResolverBuilder, Query};
///
/// let resolver = ElevationResolverBuilder::from_env()?.build()?;
///
/// match resolver.resolve((27.9881, 86.9250)).await? {
///     Elevations::Single(elevation) => println!("Everest: {:.1}m", elevation),
///     Elevations::Many(_) => unreachable!(),
/// }
///
/// let stats = resolver.cache_stats();
/// println!("Cache hit rate: {:.1}%", stats.hit_rate() * 100.0);
/// ```
pub struct ElevationResolver {
    fetcher: TileFetcher,
    projection: Arc<dyn Projection>,
    zoom: u8,
    tile_size: u32,
}

impl ElevationResolver {
    /// Create a builder for the given URL template.
    pub fn builder(url_template: impl Into<String>) -> ElevationResolverBuilder {
        ElevationResolverBuilder::new(url_template)
    }

    /// Resolve one point or a list of points.
    ///
    /// The result has the same shape as the query: a single point gives
    /// [`Elevations::Single`], a list (even of one point) gives
    /// [`Elevations::Many`] in input order.
    ///
    /// # Errors
    ///
    /// The whole query fails if any point is an invalid coordinate or any
    /// needed tile cannot be fetched or decoded. When several tiles fail, the
    /// error of the first one in tile order (column, then row) is returned.
    pub async fn resolve(&self, query: impl Into<Query>) -> Result<Elevations> {
        match query.into() {
            Query::Single(point) => {
                let values = self.resolve_batch(std::slice::from_ref(&point)).await?;
                Ok(Elevations::Single(values[0]))
            }
            Query::Many(points) => Ok(Elevations::Many(self.resolve_batch(&points).await?)),
        }
    }

    /// Elevation in meters at a single coordinate.
    pub async fn get_elevation(&self, lat: f64, lon: f64) -> Result<f32> {
        let values = self.resolve_batch(&[LatLng::new(lat, lon)]).await?;
        Ok(values[0])
    }

    /// Elevations for a list of coordinates, in input order.
    pub async fn get_elevations(&self, points: &[LatLng]) -> Result<Vec<f32>> {
        self.resolve_batch(points).await
    }

    /// Elevations for a list of coordinates, substituting `default` for
    /// points that are invalid or whose tile failed.
    ///
    /// Tiles are still grouped and fetched concurrently; a failing tile only
    /// affects its own points.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let elevations = resolver.get_elevations_or(&points, f32::NAN).await;
    /// ```
    pub async fn get_elevations_or(&self, points: &[LatLng], default: f32) -> Vec<f32> {
        let mut results = vec![default; points.len()];

        // Invalid coordinates keep the default
        let Ok(groups) = self.group_by_tile(points, true) else {
            return results;
        };

        let tiles = join_all(groups.keys().map(|&tile| self.fetcher.resolve(tile))).await;

        for (members, tile) in groups.values().zip(tiles) {
            let Ok(data) = tile else { continue };
            for (i, addr) in members {
                results[*i] = data.sample(addr.local_x, addr.local_y);
            }
        }

        results
    }

    async fn resolve_batch(&self, points: &[LatLng]) -> Result<Vec<f32>> {
        let groups = self.group_by_tile(points, false)?;
        debug!(points = points.len(), tiles = groups.len(), "resolving batch");

        // Every fetch runs to completion before results are inspected
        let tiles = join_all(groups.keys().map(|&tile| self.fetcher.resolve(tile))).await;

        let mut results = vec![0.0; points.len()];
        for (members, tile) in groups.values().zip(tiles) {
            let data = tile?;
            for (i, addr) in members {
                results[*i] = data.sample(addr.local_x, addr.local_y);
            }
        }

        Ok(results)
    }

    /// Group point indices by tile. With `skip_invalid`, points that cannot
    /// be addressed are left out instead of failing the grouping.
    fn group_by_tile(&self, points: &[LatLng], skip_invalid: bool) -> Result<TileGroups> {
        let mut groups = TileGroups::new();
        for (i, point) in points.iter().enumerate() {
            let addr = match self.address(point.lat, point.lon) {
                Ok(addr) => addr,
                Err(ElevationError::InvalidCoordinate { .. }) if skip_invalid => continue,
                Err(e) => return Err(e),
            };
            groups.entry(addr.tile).or_default().push((i, addr));
        }
        Ok(groups)
    }

    /// Tile address of a coordinate at this resolver's zoom and tile size.
    pub fn address(&self, lat: f64, lon: f64) -> Result<TileAddress> {
        address(self.projection.as_ref(), lat, lon, self.zoom, self.tile_size)
    }

    /// Transport URL of a tile.
    pub fn tile_url(&self, tile: TileIndex) -> String {
        self.fetcher.url(tile)
    }

    /// Decoded elevations of one tile, from cache or transport.
    pub async fn tile(&self, tile: TileIndex) -> Result<TileData> {
        self.fetcher.resolve(tile).await
    }

    /// Fetch every tile covering `bounds` into the cache.
    ///
    /// Up to 16 tiles are fetched at a time. Tiles beyond the cache capacity
    /// are evicted as usual, so preloading an area larger than the cache only
    /// keeps its most recently fetched part.
    ///
    /// A box whose `min_lon` is greater than its `max_lon` crosses the
    /// antimeridian and covers both edges of the map.
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::InvalidCoordinate`] if a corner of the box
    /// is not a valid coordinate, and [`ElevationError::Config`] if the box
    /// covers more than [`MAX_PRELOAD_TILES`] tiles.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use tilev::BoundingBox;
    ///
    /// let fuji = BoundingBox::new(35.2, 138.6, 35.5, 138.9);
    /// let stats = resolver.preload(&fuji).await?;
    /// println!("Loaded {} tiles in {}ms", stats.tiles_loaded, stats.elapsed_ms);
    /// ```
    pub async fn preload(&self, bounds: &BoundingBox) -> Result<PreloadStats> {
        let start = Instant::now();
        let mut stats = PreloadStats::default();

        // North-west corner has the smallest column and row
        let nw = self.address(bounds.max_lat, bounds.min_lon)?.tile;
        let se = self.address(bounds.min_lat, bounds.max_lon)?.tile;
        let rows = nw.row.min(se.row)..=nw.row.max(se.row);

        // A box with min_lon > max_lon crosses the antimeridian: it runs from
        // its west edge to the last column, then wraps to column 0
        let columns = if bounds.min_lon <= bounds.max_lon {
            vec![nw.col..=se.col]
        } else {
            let (cols, _) = grid_dimensions(self.projection.as_ref(), self.zoom, self.tile_size)?;
            vec![nw.col..=cols - 1, 0..=se.col]
        };

        let width: u64 = columns.iter().map(|c| (*c.end() - *c.start()) as u64 + 1).sum();
        let height = (*rows.end() - *rows.start()) as u64 + 1;
        if width * height > MAX_PRELOAD_TILES {
            return Err(ElevationError::config(format!(
                "preload covers {} tiles, more than the limit of {}",
                width * height,
                MAX_PRELOAD_TILES
            )));
        }

        let mut pending = Vec::new();
        for col in columns.into_iter().flatten() {
            for row in rows.clone() {
                let tile = TileIndex::new(col, row);
                stats.tiles_matched += 1;
                if self.fetcher.is_cached(tile) {
                    stats.tiles_already_cached += 1;
                } else {
                    pending.push(tile);
                }
            }
        }

        let mut results = stream::iter(pending)
            .map(|tile| self.fetcher.resolve(tile))
            .buffer_unordered(PRELOAD_CONCURRENCY);
        while let Some(result) = results.next().await {
            match result {
                Ok(_) => stats.tiles_loaded += 1,
                Err(_) => stats.tiles_failed += 1,
            }
        }

        stats.elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            matched = stats.tiles_matched,
            loaded = stats.tiles_loaded,
            cached = stats.tiles_already_cached,
            failed = stats.tiles_failed,
            elapsed_ms = stats.elapsed_ms,
            "preload complete"
        );
        Ok(stats)
    }

    /// Get cache and fetch statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.fetcher.stats()
    }

    /// Returns the maximum number of cached tiles.
    pub fn cache_capacity(&self) -> usize {
        self.fetcher.cache_capacity()
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Identifier of the projection, e.g. `EPSG:3857`.
    pub fn projection_name(&self) -> &str {
        self.projection.name()
    }
}

/// Builder for creating an [`ElevationResolver`].
///
/// # Example
///
/// ```ignore
/// use tilev::{ElevationResolverBuilder, Encoding, FileTransport};
/// use std::sync::Arc;
///
/// let resolver = ElevationResolverBuilder::new("{z}/{x}/{y}.png")
///     .zoom(10)
///     .encoding(Encoding::Terrarium)
///     .transport(Arc::new(FileTransport::new("/data/terrarium")))
///     .build()?;
/// ```
pub struct ElevationResolverBuilder {
    url_template: String,
    zoom: u8,
    tile_size: u32,
    cache_size: usize,
    decoder: Decoder,
    projection: Arc<dyn Projection>,
    transport: Option<Arc<dyn TileTransport>>,
}

impl ElevationResolverBuilder {
    /// Create a new builder for the given URL template.
    ///
    /// The template is validated by [`Self::build`].
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
            zoom: DEFAULT_ZOOM,
            tile_size: DEFAULT_TILE_SIZE,
            cache_size: DEFAULT_CACHE_SIZE,
            decoder: Encoding::default().decoder(),
            projection: Arc::new(WebMercator),
            transport: None,
        }
    }

    /// Create a builder configured from environment variables.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `TILEV_URL_TEMPLATE` | Tile URL template with `{x}`, `{y}`, `{z}` | Required |
    /// | `TILEV_ZOOM` | Zoom level | 12 |
    /// | `TILEV_TILE_SIZE` | Tile edge length in pixels | 256 |
    /// | `TILEV_CACHE_SIZE` | Maximum tiles in cache | 100 |
    /// | `TILEV_ENCODING` | `terrain-rgb` or `terrarium` | `terrain-rgb` |
    /// | `TILEV_DATA_DIR` | Read tiles from this directory instead of HTTP | None |
    ///
    /// # Example
    ///
    /// ```bash
    /// export TILEV_URL_TEMPLATE="https://s3.amazonaws.com/elevation-tiles-prod/terrarium/{z}/{x}/{y}.png"
    /// export TILEV_ENCODING=terrarium
    /// export TILEV_ZOOM=11
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if `TILEV_URL_TEMPLATE` is not set or a variable
    /// cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let url_template = std::env::var("TILEV_URL_TEMPLATE").map_err(|_| {
            ElevationError::config("TILEV_URL_TEMPLATE environment variable not set")
        })?;

        let mut builder = Self::new(url_template)
            .zoom(env_or("TILEV_ZOOM", DEFAULT_ZOOM)?)
            .tile_size(env_or("TILEV_TILE_SIZE", DEFAULT_TILE_SIZE)?)
            .cache_size(env_or("TILEV_CACHE_SIZE", DEFAULT_CACHE_SIZE)?)
            .encoding(env_or("TILEV_ENCODING", Encoding::default())?);

        if let Ok(dir) = std::env::var("TILEV_DATA_DIR") {
            builder = builder.transport(Arc::new(FileTransport::new(PathBuf::from(dir))));
        }

        Ok(builder)
    }

    /// Set the zoom level. Default is 12.
    pub fn zoom(mut self, zoom: u8) -> Self {
        self.zoom = zoom;
        self
    }

    /// Set the tile edge length in pixels. Default is 256.
    pub fn tile_size(mut self, size: u32) -> Self {
        self.tile_size = size;
        self
    }

    /// Set the maximum number of tiles to keep in cache.
    ///
    /// Default is 100 tiles. Zero disables caching.
    pub fn cache_size(mut self, size: usize) -> Self {
        self.cache_size = size;
        self
    }

    /// Decode pixels with a built-in encoding. Default is Terrain-RGB.
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.decoder = encoding.decoder();
        self
    }

    /// Decode pixels with a custom `(R, G, B, A) -> meters` function.
    pub fn decoder<F>(mut self, decoder: F) -> Self
    where
        F: Fn(u8, u8, u8, u8) -> f32 + Send + Sync + 'static,
    {
        self.decoder = Arc::new(decoder);
        self
    }

    /// Set the projection. Default is [`WebMercator`].
    pub fn projection<P: Projection + 'static>(mut self, projection: P) -> Self {
        self.projection = Arc::new(projection);
        self
    }

    /// Set the transport used to fetch tiles.
    ///
    /// Without one, [`Self::build`] uses an HTTP transport (requires the
    /// `http` feature).
    pub fn transport(mut self, transport: Arc<dyn TileTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the [`ElevationResolver`].
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::Config`] if the tile size is zero, the zoom
    /// exceeds 30, the template is invalid, or no transport is available.
    pub fn build(self) -> Result<ElevationResolver> {
        if self.tile_size == 0 {
            return Err(ElevationError::config("tile size must be positive"));
        }
        if self.zoom > MAX_ZOOM {
            return Err(ElevationError::config(format!(
                "zoom {} exceeds the maximum of {}",
                self.zoom, MAX_ZOOM
            )));
        }
        grid_dimensions(self.projection.as_ref(), self.zoom, self.tile_size)?;
        let template = UrlTemplate::parse(self.url_template)?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport()?,
        };

        debug!(
            template = %template,
            zoom = self.zoom,
            tile_size = self.tile_size,
            cache_size = self.cache_size,
            projection = self.projection.name(),
            "building elevation resolver"
        );

        Ok(ElevationResolver {
            fetcher: TileFetcher::new(
                transport,
                template,
                self.zoom,
                self.tile_size,
                self.decoder,
                self.cache_size,
            ),
            projection: self.projection,
            zoom: self.zoom,
            tile_size: self.tile_size,
        })
    }
}

#[cfg(feature = "http")]
fn default_transport() -> Result<Arc<dyn TileTransport>> {
    let transport = crate::transport::HttpTransport::new()
        .map_err(|e| ElevationError::config(e.to_string()))?;
    Ok(Arc::new(transport))
}

#[cfg(not(feature = "http"))]
fn default_transport() -> Result<Arc<dyn TileTransport>> {
    Err(ElevationError::config(
        "no transport configured: enable the `http` feature or call `transport()`",
    ))
}

/// Parse an environment variable, falling back to `default` when unset.
fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value.trim().parse().map_err(|e| {
            ElevationError::config(format!("invalid {} '{}': {}", name, value, e))
        }),
        Err(_) => Ok(default),
    }
}

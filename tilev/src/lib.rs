//! # tilev - Terrain Elevation from Map Tiles
//!
//! Async library for looking up terrain elevation from tiled height-map
//! imagery such as Mapbox Terrain-RGB or Mapzen/AWS Terrarium.
//!
//! ## Features
//!
//! - **Batched**: points are grouped by tile; each distinct tile is fetched
//!   once, and all tiles of a batch are fetched concurrently
//! - **Order-preserving**: results come back in input order and input shape
//! - **Cached**: a bounded LRU cache of decoded tiles, with in-flight request
//!   coalescing across concurrent batches
//! - **Pluggable**: transport, projection and pixel decoder are all swappable
//!
//! ## Quick Start
//!
//! ```ignore
//! use tilev::{ElevationResolverBuilder, Encoding, LatLng};
//!
//! let resolver = ElevationResolverBuilder::new(
//!     "https://s3.amazonaws.com/elevation-tiles-prod/terrarium/{z}/{x}/{y}.png",
//! )
//! .encoding(Encoding::Terrarium)
//! .zoom(12)
//! .build()?;
//!
//! let elevation = resolver.get_elevation(35.3606, 138.7274).await?;
//! println!("Mount Fuji: {:.1}m", elevation);
//! ```
//!
//! ## Tile Format
//!
//! Each tile is a square RGB(A) image (256×256 by default) on the slippy-map
//! grid. Elevation is packed into the color channels:
//!
//! - **Terrain-RGB**: `-10000 + (R × 65536 + G × 256 + B) × 0.1`
//! - **Terrarium**: `R × 256 + G + B / 256 - 32768`
//!
//! Tile sets that omit all-ocean tiles answer such requests with a short
//! `Tile not found` body; those tiles resolve to an elevation of zero.
//!
//! ## Cargo Features
//!
//! - `http` - [`HttpTransport`], used by default when no transport is set
//! - `geojson` - [`geojson`] enrichment of GeoJSON geometries

pub mod addressing;
pub mod cache;
mod coalesce;
pub mod decode;
pub mod error;
mod fetcher;
pub mod projection;
pub mod resolver;
pub mod template;
pub mod tile;
pub mod transport;

#[cfg(feature = "geojson")]
pub mod geojson;

#[cfg(test)]
mod test_support;

// Re-export main types at crate root for convenience
pub use addressing::{TileAddress, TileIndex};
pub use decode::{DecodeError, Decoder, Encoding};
pub use error::{ElevationError, Result};
pub use fetcher::CacheStats;
pub use projection::{Equirectangular, PixelPoint, Projection, WebMercator};
pub use resolver::{
    BoundingBox, ElevationResolver, ElevationResolverBuilder, Elevations, LatLng, PreloadStats,
    Query,
};
pub use tile::{TileData, DEFAULT_TILE_SIZE};
pub use transport::{FileTransport, TileTransport, TransportError, TransportResponse};

#[cfg(feature = "http")]
pub use transport::HttpTransport;

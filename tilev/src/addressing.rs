//! Tile addressing: which tile a point falls in, and where inside it.

use std::fmt;

use crate::error::{ElevationError, Result};
use crate::projection::Projection;

/// Column/row index of one tile at the resolver's zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileIndex {
    /// Tile column (x), west to east.
    pub col: u32,
    /// Tile row (y), north to south.
    pub row: u32,
}

impl TileIndex {
    pub fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }
}

impl fmt::Display for TileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

/// A point's tile and its pixel offset within that tile.
///
/// The local offsets keep their fractional part; nearest-neighbor sampling
/// floors them when reading the tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileAddress {
    pub tile: TileIndex,
    pub local_x: f64,
    pub local_y: f64,
}

/// Number of tiles along each axis of the grid.
///
/// # Errors
///
/// Returns [`ElevationError::Config`] if the tile size is zero or an axis has
/// more tiles than a [`TileIndex`] can number.
pub fn grid_dimensions(
    projection: &dyn Projection,
    zoom: u8,
    tile_size: u32,
) -> Result<(u32, u32)> {
    if tile_size == 0 {
        return Err(ElevationError::config("tile size must be positive"));
    }
    let (width, height) = projection.world_extent(zoom);
    let size = tile_size as f64;
    let axis = |extent: f64| -> Result<u32> {
        let tiles = (extent / size).ceil().max(1.0);
        if tiles > u32::MAX as f64 {
            return Err(ElevationError::config(format!(
                "{} tiles of {} pixels per axis at zoom {} exceeds the addressable {}",
                tiles,
                tile_size,
                zoom,
                u32::MAX
            )));
        }
        Ok(tiles as u32)
    };
    Ok((axis(width)?, axis(height)?))
}

/// Compute the tile address of a coordinate.
///
/// Points on the east or south edge of the world are assigned to the last
/// tile of the grid.
///
/// # Errors
///
/// Returns [`ElevationError::InvalidCoordinate`] if the projection rejects
/// the coordinate, or [`ElevationError::Config`] if the grid cannot be
/// addressed (see [`grid_dimensions`]).
pub fn address(
    projection: &dyn Projection,
    lat: f64,
    lon: f64,
    zoom: u8,
    tile_size: u32,
) -> Result<TileAddress> {
    let (cols, rows) = grid_dimensions(projection, zoom, tile_size)?;
    let pixel = projection.project(lat, lon, zoom)?;
    let size = tile_size as f64;

    let col = ((pixel.x / size).floor().max(0.0) as u32).min(cols - 1);
    let row = ((pixel.y / size).floor().max(0.0) as u32).min(rows - 1);

    Ok(TileAddress {
        tile: TileIndex::new(col, row),
        local_x: pixel.x - col as f64 * size,
        local_y: pixel.y - row as f64 * size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::{PixelPoint, WebMercator};

    #[test]
    fn test_address_origin() {
        let addr = address(&WebMercator, 0.0, 0.0, 1, 256).unwrap();
        assert_eq!(addr.tile, TileIndex::new(1, 1));
        assert!(addr.local_x.abs() < 1e-9);
        assert!(addr.local_y.abs() < 1e-9);
    }

    #[test]
    fn test_address_keeps_fraction() {
        // Pick the geographic point of pixel (10 * 256 + 5.75, 20 * 256 + 6.25).
        let zoom = 12;
        let pixel = PixelPoint::new(10.0 * 256.0 + 5.75, 20.0 * 256.0 + 6.25);
        let (lat, lon) = WebMercator.unproject(pixel, zoom);

        let addr = address(&WebMercator, lat, lon, zoom, 256).unwrap();
        assert_eq!(addr.tile, TileIndex::new(10, 20));
        assert!((addr.local_x - 5.75).abs() < 1e-6);
        assert!((addr.local_y - 6.25).abs() < 1e-6);
    }

    #[test]
    fn test_address_larger_tiles() {
        let pixel = PixelPoint::new(700.0, 1100.0);
        let (lat, lon) = WebMercator.unproject(pixel, 3);

        let addr = address(&WebMercator, lat, lon, 3, 512).unwrap();
        assert_eq!(addr.tile, TileIndex::new(1, 2));
        assert!((addr.local_x - 188.0).abs() < 1e-6);
        assert!((addr.local_y - 76.0).abs() < 1e-6);
    }

    #[test]
    fn test_address_world_edges() {
        let addr = address(&WebMercator, -89.0, 180.0, 2, 256).unwrap();
        assert_eq!(addr.tile, TileIndex::new(3, 3));
        assert!(addr.local_x <= 256.0);

        let addr = address(&WebMercator, 89.0, -180.0, 2, 256).unwrap();
        assert_eq!(addr.tile, TileIndex::new(0, 0));
    }

    #[test]
    fn test_address_invalid_coordinate() {
        let err = address(&WebMercator, f64::NAN, 0.0, 12, 256).unwrap_err();
        assert!(matches!(err, ElevationError::InvalidCoordinate { .. }));
    }

    #[test]
    fn test_grid_dimensions() {
        assert_eq!(grid_dimensions(&WebMercator, 0, 256), Ok((1, 1)));
        assert_eq!(grid_dimensions(&WebMercator, 12, 256), Ok((4096, 4096)));
        assert_eq!(grid_dimensions(&WebMercator, 0, 512), Ok((1, 1)));
        assert_eq!(
            grid_dimensions(&crate::projection::Equirectangular, 0, 256),
            Ok((2, 1))
        );
    }

    #[test]
    fn test_grid_dimensions_largest_addressable() {
        // 2^30 tiles per axis still fits
        assert_eq!(
            grid_dimensions(&WebMercator, 30, 256),
            Ok((1 << 30, 1 << 30))
        );
    }

    #[test]
    fn test_oversized_grid_is_rejected() {
        // 2^34 tiles per axis cannot be numbered
        let err = grid_dimensions(&WebMercator, 30, 16).unwrap_err();
        assert!(matches!(err, ElevationError::Config { .. }));

        // A point far east would otherwise collapse into the last u32 column
        let pixel = PixelPoint::new(2e11 + 3.5, 1e11 + 2.5);
        let (lat, lon) = WebMercator.unproject(pixel, 30);
        let err = address(&WebMercator, lat, lon, 30, 16).unwrap_err();
        assert!(matches!(err, ElevationError::Config { .. }));
    }

    #[test]
    fn test_zero_tile_size_is_rejected() {
        let err = grid_dimensions(&WebMercator, 0, 0).unwrap_err();
        assert!(matches!(err, ElevationError::Config { .. }));
    }

    #[test]
    fn test_tile_index_ordering_and_display() {
        assert!(TileIndex::new(1, 9) < TileIndex::new(2, 0));
        assert!(TileIndex::new(3, 1) < TileIndex::new(3, 2));
        assert_eq!(TileIndex::new(10, 20).to_string(), "(10, 20)");
    }
}

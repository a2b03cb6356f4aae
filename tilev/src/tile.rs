//! Decoded elevation tiles.
//!
//! This module provides [`TileData`], the flat elevation buffer produced by
//! decoding one tile image, and the nearest-neighbor sampler used to read it.

use std::sync::Arc;

/// Default edge length of a tile in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Elevations for every pixel of one square tile, row-major.
///
/// Cloning is cheap: the values are shared behind an [`Arc`], so every query
/// that hits the same cached tile reads the same buffer.
///
/// # Example
///
/// ```
/// use tilev::TileData;
///
/// let tile = TileData::zeroed(256);
/// assert_eq!(tile.sample(12.7, 200.2), 0.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TileData {
    /// Edge length in pixels.
    size: u32,
    /// `size * size` elevations in meters.
    values: Arc<[f32]>,
}

impl TileData {
    /// Wrap a row-major buffer of `size * size` elevations.
    ///
    /// Returns `None` if the buffer length does not match.
    pub fn new(size: u32, values: Vec<f32>) -> Option<Self> {
        if values.len() != (size as usize) * (size as usize) {
            return None;
        }
        Some(Self {
            size,
            values: values.into(),
        })
    }

    /// A tile where every elevation is zero.
    ///
    /// Used for tiles the server reports as missing, e.g. open ocean.
    pub fn zeroed(size: u32) -> Self {
        let len = (size as usize) * (size as usize);
        Self {
            size,
            values: vec![0.0; len].into(),
        }
    }

    /// Nearest-neighbor lookup at a fractional in-tile pixel offset.
    ///
    /// The fractional part is discarded and the pixel is clamped to the tile,
    /// so an offset of exactly `size` reads the last row/column.
    pub fn sample(&self, local_x: f64, local_y: f64) -> f32 {
        let last = self.size.saturating_sub(1) as usize;
        let col = (local_x.floor().max(0.0) as usize).min(last);
        let row = (local_y.floor().max(0.0) as usize).min(last);
        self.get(col, row)
    }

    /// Elevation at an integer pixel (col = x, row = y).
    ///
    /// # Panics
    ///
    /// Panics if the pixel is outside the tile.
    pub fn get(&self, col: usize, row: usize) -> f32 {
        self.values[row * self.size as usize + col]
    }

    /// Returns the edge length in pixels.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Returns the raw row-major elevations.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Minimum and maximum elevation in the tile, ignoring NaN.
    ///
    /// Returns `None` for an empty tile or one made only of NaN values.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.values
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Whether two handles share the same underlying buffer.
    pub fn ptr_eq(&self, other: &TileData) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }
}

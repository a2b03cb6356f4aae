//! Geographic to pixel projections.
//!
//! A [`Projection`] maps a latitude/longitude pair onto a global pixel grid at
//! a given zoom level. The grid is `256 · 2^zoom` pixels along its reference
//! axis regardless of the tile size used to cut it, so a resolver configured
//! with 512-pixel tiles sees half as many tiles per side at the same zoom.
//!
//! Two projections are provided:
//!
//! - [`WebMercator`] (EPSG:3857): the slippy-map grid used by Terrain-RGB and
//!   Terrarium tile sets. This is the default.
//! - [`Equirectangular`] (EPSG:4326): plate carrée, two tiles wide at zoom 0.

use std::f64::consts::PI;

use crate::error::{ElevationError, Result};

/// Pixel size of the reference axis at zoom 0.
const BASE_WORLD_SIZE: f64 = 256.0;

/// Equatorial radius of the spherical Mercator model in meters.
const EARTH_RADIUS: f64 = 6_378_137.0;

/// Latitude limit of Web Mercator; latitudes beyond it are clamped.
pub const MAX_LATITUDE: f64 = 85.051_128_779_8;

/// A position on the global pixel grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelPoint {
    /// Pixels from the west edge of the world.
    pub x: f64,
    /// Pixels from the north edge of the world.
    pub y: f64,
}

impl PixelPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Mapping between geographic coordinates and the global pixel grid.
pub trait Projection: Send + Sync {
    /// Project a coordinate to pixel space at `zoom`.
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::InvalidCoordinate`] if the coordinate is not
    /// finite or lies outside ±90° latitude / ±180° longitude.
    fn project(&self, lat: f64, lon: f64, zoom: u8) -> Result<PixelPoint>;

    /// Inverse of [`Projection::project`]: returns `(lat, lon)`.
    fn unproject(&self, point: PixelPoint, zoom: u8) -> (f64, f64);

    /// Width and height of the pixel grid at `zoom`.
    fn world_extent(&self, zoom: u8) -> (f64, f64);

    /// Short identifier used in logs and diagnostics.
    fn name(&self) -> &str;
}

/// Side length of the reference axis in pixels at `zoom`.
#[inline]
pub fn world_size(zoom: u8) -> f64 {
    BASE_WORLD_SIZE * 2.0_f64.powi(zoom as i32)
}

fn validate(lat: f64, lon: f64) -> Result<()> {
    if !lat.is_finite() || !lon.is_finite() {
        return Err(ElevationError::InvalidCoordinate { lat, lon });
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(ElevationError::InvalidCoordinate { lat, lon });
    }
    Ok(())
}

/// Spherical Web Mercator (EPSG:3857).
#[derive(Debug, Clone, Copy, Default)]
pub struct WebMercator;

impl WebMercator {
    /// Scale from projected meters to the unit square.
    const SCALE: f64 = 0.5 / (PI * EARTH_RADIUS);
}

impl Projection for WebMercator {
    fn project(&self, lat: f64, lon: f64, zoom: u8) -> Result<PixelPoint> {
        validate(lat, lon)?;

        let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
        let sin = lat.to_radians().sin();
        let mx = EARTH_RADIUS * lon.to_radians();
        let my = EARTH_RADIUS * ((1.0 + sin) / (1.0 - sin)).ln() / 2.0;

        let size = world_size(zoom);
        Ok(PixelPoint {
            x: size * (Self::SCALE * mx + 0.5),
            y: size * (-Self::SCALE * my + 0.5),
        })
    }

    fn unproject(&self, point: PixelPoint, zoom: u8) -> (f64, f64) {
        let size = world_size(zoom);
        let mx = (point.x / size - 0.5) / Self::SCALE;
        let my = (point.y / size - 0.5) / -Self::SCALE;

        let lon = (mx / EARTH_RADIUS).to_degrees();
        let lat = (2.0 * (my / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
        (lat, lon)
    }

    fn world_extent(&self, zoom: u8) -> (f64, f64) {
        let size = world_size(zoom);
        (size, size)
    }

    fn name(&self) -> &str {
        "EPSG:3857"
    }
}

/// Plate carrée (EPSG:4326): longitude and latitude map linearly to pixels.
#[derive(Debug, Clone, Copy, Default)]
pub struct Equirectangular;

impl Projection for Equirectangular {
    fn project(&self, lat: f64, lon: f64, zoom: u8) -> Result<PixelPoint> {
        validate(lat, lon)?;

        let size = world_size(zoom);
        Ok(PixelPoint {
            x: size * (lon / 180.0 + 1.0),
            y: size * (-lat / 180.0 + 0.5),
        })
    }

    fn unproject(&self, point: PixelPoint, zoom: u8) -> (f64, f64) {
        let size = world_size(zoom);
        let lon = (point.x / size - 1.0) * 180.0;
        let lat = (0.5 - point.y / size) * 180.0;
        (lat, lon)
    }

    fn world_extent(&self, zoom: u8) -> (f64, f64) {
        let size = world_size(zoom);
        (2.0 * size, size)
    }

    fn name(&self) -> &str {
        "EPSG:4326"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_size() {
        assert_eq!(world_size(0), 256.0);
        assert_eq!(world_size(1), 512.0);
        assert_eq!(world_size(12), 1_048_576.0);
    }

    #[test]
    fn test_web_mercator_origin() {
        let p = WebMercator.project(0.0, 0.0, 0).unwrap();
        assert!((p.x - 128.0).abs() < 1e-9);
        assert!((p.y - 128.0).abs() < 1e-9);
    }

    #[test]
    fn test_web_mercator_corners() {
        let nw = WebMercator.project(MAX_LATITUDE, -180.0, 1).unwrap();
        assert!(nw.x.abs() < 1e-9);
        assert!(nw.y.abs() < 1e-6);

        let se = WebMercator.project(-MAX_LATITUDE, 180.0, 1).unwrap();
        assert!((se.x - 512.0).abs() < 1e-9);
        assert!((se.y - 512.0).abs() < 1e-6);
    }

    #[test]
    fn test_web_mercator_clamps_polar_latitudes() {
        let clamped = WebMercator.project(89.9, 10.0, 3).unwrap();
        let limit = WebMercator.project(MAX_LATITUDE, 10.0, 3).unwrap();
        assert_eq!(clamped, limit);
    }

    #[test]
    fn test_web_mercator_new_york_tile() {
        // New York City at zoom 16 lies in tile column 19295, row 24640.
        let p = WebMercator.project(40.7128, -74.0060, 16).unwrap();
        assert_eq!((p.x / 256.0).floor() as u32, 19295);
        assert_eq!((p.y / 256.0).floor() as u32, 24640);
    }

    #[test]
    fn test_web_mercator_roundtrip() {
        for (lat, lon) in [(35.3606, 138.7274), (-33.9, 151.2), (51.5074, -0.1278)] {
            let p = WebMercator.project(lat, lon, 12).unwrap();
            let (lat2, lon2) = WebMercator.unproject(p, 12);
            assert!((lat - lat2).abs() < 1e-9, "lat {} vs {}", lat, lat2);
            assert!((lon - lon2).abs() < 1e-9, "lon {} vs {}", lon, lon2);
        }
    }

    #[test]
    fn test_invalid_coordinates() {
        for (lat, lon) in [
            (91.0, 0.0),
            (-91.0, 0.0),
            (0.0, 181.0),
            (0.0, -180.5),
            (f64::NAN, 0.0),
            (0.0, f64::INFINITY),
        ] {
            let err = WebMercator.project(lat, lon, 5).unwrap_err();
            assert!(matches!(err, ElevationError::InvalidCoordinate { .. }));
            assert!(Equirectangular.project(lat, lon, 5).is_err());
        }
    }

    #[test]
    fn test_equirectangular() {
        let p = Equirectangular.project(0.0, 0.0, 0).unwrap();
        assert_eq!(p, PixelPoint::new(256.0, 128.0));

        let p = Equirectangular.project(90.0, -180.0, 0).unwrap();
        assert_eq!(p, PixelPoint::new(0.0, 0.0));

        assert_eq!(Equirectangular.world_extent(2), (2048.0, 1024.0));

        let p = Equirectangular.project(-12.5, 77.25, 7).unwrap();
        let (lat, lon) = Equirectangular.unproject(p, 7);
        assert!((lat + 12.5).abs() < 1e-9);
        assert!((lon - 77.25).abs() < 1e-9);
    }
}

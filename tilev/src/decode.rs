//! Turning tile imagery into elevations.
//!
//! Decoding happens in two steps:
//!
//! 1. [`extract_pixels`] reads the opaque image bytes (PNG or WebP) into a
//!    flat RGBA buffer.
//! 2. [`decode_tile`] applies a channel → elevation function to every pixel,
//!    producing a [`TileData`].
//!
//! Two encodings are built in, see [`Encoding`]. Any other encoding can be
//! supplied as a closure of type [`Decoder`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::tile::TileData;

/// Channel → elevation function applied to each pixel's `(R, G, B, A)`.
pub type DecoderFn = dyn Fn(u8, u8, u8, u8) -> f32 + Send + Sync;

/// Shared handle to a [`DecoderFn`].
pub type Decoder = Arc<DecoderFn>;

/// Errors raised while decoding a tile payload.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// The pixel buffer does not hold exactly `width × height` RGBA pixels.
    #[error("Malformed pixel buffer: expected {expected} bytes, got {actual}")]
    TruncatedPixels { expected: usize, actual: usize },

    /// The image does not have the configured tile dimensions.
    #[error("Tile image is {width}x{height} pixels, expected {expected}x{expected}")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: u32,
    },

    /// The payload is not a readable image.
    #[error("Unreadable image: {0}")]
    Image(String),
}

/// RGBA pixels extracted from a tile image.
#[derive(Debug, Clone)]
pub struct RawPixels {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA bytes, four per pixel.
    pub rgba: Vec<u8>,
}

/// Read image bytes into a flat RGBA buffer.
pub fn extract_pixels(bytes: &[u8]) -> Result<RawPixels, DecodeError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| DecodeError::Image(e.to_string()))?
        .to_rgba8();
    let (width, height) = img.dimensions();

    Ok(RawPixels {
        width,
        height,
        rgba: img.into_raw(),
    })
}

/// Apply `decoder` to every pixel of a `width × height` RGBA buffer.
///
/// # Errors
///
/// Returns [`DecodeError::TruncatedPixels`] unless the buffer holds exactly
/// `width × height × 4` bytes.
pub fn decode(
    rgba: &[u8],
    width: u32,
    height: u32,
    decoder: &DecoderFn,
) -> Result<Vec<f32>, DecodeError> {
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        return Err(DecodeError::TruncatedPixels {
            expected,
            actual: rgba.len(),
        });
    }

    Ok(rgba
        .chunks_exact(4)
        .map(|px| decoder(px[0], px[1], px[2], px[3]))
        .collect())
}

/// Decode extracted pixels into a square tile of `tile_size` pixels.
pub fn decode_tile(
    pixels: &RawPixels,
    tile_size: u32,
    decoder: &DecoderFn,
) -> Result<TileData, DecodeError> {
    if pixels.width != tile_size || pixels.height != tile_size {
        return Err(DecodeError::SizeMismatch {
            width: pixels.width,
            height: pixels.height,
            expected: tile_size,
        });
    }

    let values = decode(&pixels.rgba, pixels.width, pixels.height, decoder)?;
    // Length was checked by `decode`.
    TileData::new(tile_size, values).ok_or(DecodeError::TruncatedPixels {
        expected: tile_size as usize * tile_size as usize * 4,
        actual: pixels.rgba.len(),
    })
}

/// Built-in RGB elevation encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Mapbox Terrain-RGB: `-10000 + (R·65536 + G·256 + B) × 0.1`.
    #[default]
    TerrainRgb,
    /// Mapzen/AWS Terrarium: `R·256 + G + B/256 − 32768`.
    Terrarium,
}

impl Encoding {
    /// Elevation in meters for one pixel. Alpha is ignored.
    pub fn decode(self, r: u8, g: u8, b: u8, _a: u8) -> f32 {
        match self {
            Encoding::TerrainRgb => {
                let packed = r as f64 * 65536.0 + g as f64 * 256.0 + b as f64;
                (-10000.0 + packed * 0.1) as f32
            }
            Encoding::Terrarium => {
                (r as f64 * 256.0 + g as f64 + b as f64 / 256.0 - 32768.0) as f32
            }
        }
    }

    /// Pixel that decodes back to `elevation` within the encoding's precision
    /// (0.1 m for Terrain-RGB, 1/256 m for Terrarium). Out-of-range values
    /// saturate.
    pub fn encode(self, elevation: f32) -> [u8; 4] {
        match self {
            Encoding::TerrainRgb => {
                let packed = ((elevation as f64 + 10000.0) * 10.0)
                    .round()
                    .clamp(0.0, 16_777_215.0) as u32;
                [
                    (packed >> 16) as u8,
                    (packed >> 8 & 0xFF) as u8,
                    (packed & 0xFF) as u8,
                    255,
                ]
            }
            Encoding::Terrarium => {
                let scaled = ((elevation as f64 + 32768.0) * 256.0)
                    .round()
                    .clamp(0.0, 16_777_215.0) as u32;
                [
                    (scaled >> 16) as u8,
                    (scaled >> 8 & 0xFF) as u8,
                    (scaled & 0xFF) as u8,
                    255,
                ]
            }
        }
    }

    /// This encoding as a shareable [`Decoder`].
    pub fn decoder(self) -> Decoder {
        Arc::new(move |r, g, b, a| self.decode(r, g, b, a))
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::TerrainRgb => f.write_str("terrain-rgb"),
            Encoding::Terrarium => f.write_str("terrarium"),
        }
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "terrain-rgb" | "terrainrgb" | "mapbox" => Ok(Encoding::TerrainRgb),
            "terrarium" => Ok(Encoding::Terrarium),
            other => Err(format!(
                "unknown encoding '{}' (expected terrain-rgb or terrarium)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::encode_png;

    #[test]
    fn test_terrain_rgb_decode() {
        let enc = Encoding::TerrainRgb;
        assert_eq!(enc.decode(0, 0, 0, 255), -10000.0);
        // 1 m above sea level: (10000 + 1) * 10 = 100010 = 0x01_86_AA
        assert!((enc.decode(0x01, 0x86, 0xAA, 255) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_terrarium_decode() {
        let enc = Encoding::Terrarium;
        assert_eq!(enc.decode(128, 0, 0, 255), 0.0);
        assert_eq!(enc.decode(128, 100, 128, 255), 100.5);
        assert_eq!(enc.decode(0, 0, 0, 0), -32768.0);
    }

    #[test]
    fn test_encoding_roundtrip() {
        let elevations = [-432.1_f32, -0.1, 0.0, 1.0, 123.4, 3776.2, 8848.9];
        for e in elevations {
            let [r, g, b, a] = Encoding::TerrainRgb.encode(e);
            let decoded = Encoding::TerrainRgb.decode(r, g, b, a);
            assert!((decoded - e).abs() < 0.051, "terrain-rgb {} -> {}", e, decoded);

            let [r, g, b, a] = Encoding::Terrarium.encode(e);
            let decoded = Encoding::Terrarium.decode(r, g, b, a);
            assert!((decoded - e).abs() < 0.003, "terrarium {} -> {}", e, decoded);
        }
    }

    #[test]
    fn test_encoding_from_str() {
        assert_eq!("terrain-rgb".parse(), Ok(Encoding::TerrainRgb));
        assert_eq!("Mapbox".parse(), Ok(Encoding::TerrainRgb));
        assert_eq!("terrarium".parse(), Ok(Encoding::Terrarium));
        assert!("png".parse::<Encoding>().is_err());
        assert_eq!(Encoding::Terrarium.to_string(), "terrarium");
    }

    #[test]
    fn test_decode_row_major() {
        // 2×1 image: left pixel 5 m, right pixel 7 m (identity on red channel).
        let rgba = [5, 0, 0, 255, 7, 0, 0, 255];
        let values = decode(&rgba, 2, 1, &|r, _, _, _| r as f32).unwrap();
        assert_eq!(values, vec![5.0, 7.0]);
    }

    #[test]
    fn test_decode_truncated_buffer() {
        let err = decode(&[0u8; 15], 2, 2, &|_, _, _, _| 0.0).unwrap_err();
        assert_eq!(
            err,
            DecodeError::TruncatedPixels {
                expected: 16,
                actual: 15
            }
        );
        assert!(decode(&[0u8; 20], 2, 2, &|_, _, _, _| 0.0).is_err());
    }

    #[test]
    fn test_decode_tile_from_png_roundtrip() {
        let size = 8;
        let elevation = |col: u32, row: u32| (row * 100 + col) as f32 * 1.5 - 20.0;
        let png = encode_png(size, Encoding::TerrainRgb, elevation);

        let pixels = extract_pixels(&png).unwrap();
        assert_eq!((pixels.width, pixels.height), (size, size));

        let decoder = Encoding::TerrainRgb.decoder();
        let tile = decode_tile(&pixels, size, decoder.as_ref()).unwrap();
        for row in 0..size {
            for col in 0..size {
                let got = tile.get(col as usize, row as usize);
                let want = elevation(col, row);
                assert!((got - want).abs() < 0.051, "({}, {}): {} vs {}", col, row, got, want);
            }
        }
    }

    #[test]
    fn test_decode_tile_size_mismatch() {
        let png = encode_png(4, Encoding::TerrainRgb, |_, _| 0.0);
        let pixels = extract_pixels(&png).unwrap();
        let err = decode_tile(&pixels, 256, &|_, _, _, _| 0.0).unwrap_err();
        assert!(matches!(err, DecodeError::SizeMismatch { width: 4, .. }));
    }

    #[test]
    fn test_extract_pixels_rejects_garbage() {
        let err = extract_pixels(b"definitely not an image").unwrap_err();
        assert!(matches!(err, DecodeError::Image(_)));
    }
}

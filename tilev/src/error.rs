//! Error types for the tilev library.

use thiserror::Error;

use crate::addressing::TileIndex;
use crate::decode::DecodeError;

/// Errors that can occur while resolving elevations.
///
/// The type is `Clone` so that every caller waiting on a shared in-flight
/// tile fetch receives the same failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ElevationError {
    /// The coordinate cannot be projected onto the tile grid.
    #[error("Invalid coordinate: lat={lat}, lon={lon} (valid: lat ±90°, lon ±180°, finite)")]
    InvalidCoordinate { lat: f64, lon: f64 },

    /// The transport failed or answered with a status that is not a tile.
    #[error("Failed to fetch tile {tile} from {url}: {reason}")]
    TileFetch {
        tile: TileIndex,
        url: String,
        reason: String,
    },

    /// The tile payload could not be turned into an elevation buffer.
    #[error("Failed to decode tile {tile} from {url}: {source}")]
    Decode {
        tile: TileIndex,
        url: String,
        #[source]
        source: DecodeError,
    },

    /// The resolver was configured with invalid options.
    #[error("Invalid configuration: {message}")]
    Config { message: String },
}

impl ElevationError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        ElevationError::Config {
            message: message.into(),
        }
    }
}

/// Result type alias using [`ElevationError`].
pub type Result<T> = std::result::Result<T, ElevationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ElevationError::InvalidCoordinate {
            lat: 91.0,
            lon: 0.0,
        };
        assert!(err.to_string().contains("91"));

        let err = ElevationError::TileFetch {
            tile: TileIndex::new(10, 20),
            url: "https://example.com/12/10/20.png".to_string(),
            reason: "HTTP 500".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("(10, 20)"));
        assert!(message.contains("https://example.com/12/10/20.png"));
        assert!(message.contains("HTTP 500"));

        let err = ElevationError::Decode {
            tile: TileIndex::new(1, 2),
            url: "tiles/12/1/2.png".to_string(),
            source: DecodeError::TruncatedPixels {
                expected: 16,
                actual: 12,
            },
        };
        assert!(err.to_string().contains("expected 16"));

        let err = ElevationError::config("tile size must be positive");
        assert!(err.to_string().contains("tile size must be positive"));
    }
}

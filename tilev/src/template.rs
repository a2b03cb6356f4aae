//! Tile URL templates.
//!
//! A template is a URL (or relative path) with `{x}`, `{y}` and `{z}`
//! placeholders for the tile column, row and zoom level:
//!
//! - `https://api.example.com/v4/terrain/{z}/{x}/{y}.pngraw`
//! - `https://s3.amazonaws.com/elevation-tiles-prod/terrarium/{z}/{x}/{y}.png`
//! - `{z}/{x}/{y}.png` (for [`crate::FileTransport`])

use std::fmt;

use crate::addressing::TileIndex;
use crate::error::{ElevationError, Result};

const PLACEHOLDERS: [&str; 3] = ["x", "y", "z"];

/// A validated tile URL template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    template: String,
}

impl UrlTemplate {
    /// Validate a template string.
    ///
    /// Every `{...}` group must be one of `{x}`, `{y}` or `{z}`. The `{x}`
    /// and `{y}` placeholders are required; `{z}` is optional so that a
    /// single-zoom tile set can use a flat layout.
    pub fn parse(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if template.trim().is_empty() {
            return Err(ElevationError::config("URL template is empty"));
        }

        let mut rest = template.as_str();
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(|| {
                ElevationError::config(format!("Unclosed placeholder in URL template '{}'", template))
            })?;
            let name = &after[..close];
            if !PLACEHOLDERS.contains(&name) {
                return Err(ElevationError::config(format!(
                    "Unknown placeholder '{{{}}}' in URL template '{}' (supported: {{x}}, {{y}}, {{z}})",
                    name, template
                )));
            }
            rest = &after[close + 1..];
        }

        for required in ["{x}", "{y}"] {
            if !template.contains(required) {
                return Err(ElevationError::config(format!(
                    "URL template '{}' is missing the {} placeholder",
                    template, required
                )));
            }
        }

        Ok(Self { template })
    }

    /// Substitute a tile's column, row and zoom into the template.
    pub fn expand(&self, tile: TileIndex, zoom: u8) -> String {
        self.template
            .replace("{x}", &tile.col.to_string())
            .replace("{y}", &tile.row.to_string())
            .replace("{z}", &zoom.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }
}

impl fmt::Display for UrlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand() {
        let template = UrlTemplate::parse("https://tiles.example.com/{z}/{x}/{y}.png").unwrap();
        assert_eq!(
            template.expand(TileIndex::new(10, 20), 12),
            "https://tiles.example.com/12/10/20.png"
        );
    }

    #[test]
    fn test_expand_repeated_placeholder() {
        let template = UrlTemplate::parse("{z}/{x}/{y}/{x}-{y}.png").unwrap();
        assert_eq!(template.expand(TileIndex::new(3, 4), 5), "5/3/4/3-4.png");
    }

    #[test]
    fn test_optional_zoom() {
        let template = UrlTemplate::parse("tiles/{x}_{y}.webp").unwrap();
        assert_eq!(template.expand(TileIndex::new(1, 2), 9), "tiles/1_2.webp");
    }

    #[test]
    fn test_rejects_unknown_placeholder() {
        let err = UrlTemplate::parse("https://{s}.example.com/{z}/{x}/{y}.png").unwrap_err();
        assert!(matches!(err, ElevationError::Config { .. }));
        assert!(err.to_string().contains("{s}"));
    }

    #[test]
    fn test_rejects_missing_or_malformed() {
        assert!(UrlTemplate::parse("").is_err());
        assert!(UrlTemplate::parse("https://example.com/{z}/{x}.png").is_err());
        assert!(UrlTemplate::parse("https://example.com/{z}/{x}/{y.png").is_err());
    }
}

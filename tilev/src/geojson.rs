//! GeoJSON elevation enrichment.
//!
//! This module adds elevation as the Z coordinate of every position in a
//! GeoJSON geometry. Enable the `geojson` feature to use it.
//!
//! All positions of a geometry (or of a whole document) are resolved as one
//! batch, so a long LineString crossing a handful of tiles costs one fetch
//! per tile.
//!
//! # Example
//!
//! ```ignore
//! use tilev::geojson::add_elevations_to_geometry;
//! use geojson::Geometry;
//!
//! let geometry: Geometry = r#"{"type": "Point", "coordinates": [138.7274, 35.3606]}"#
//!     .parse()
//!     .unwrap();
//!
//! let enriched = add_elevations_to_geometry(&resolver, geometry).await?;
//! // Result: {"type": "Point", "coordinates": [138.7274, 35.3606, 3776.0]}
//! ```

use geojson::{GeoJson, Geometry, Value as GeoJsonValue};

use crate::error::Result;
use crate::resolver::{ElevationResolver, LatLng};

/// Add elevations to all coordinates in a GeoJSON geometry.
///
/// Input coordinates are in GeoJSON order: `[longitude, latitude]` or
/// `[longitude, latitude, altitude]`. An existing altitude is replaced.
///
/// Every geometry type is supported, including nested collections.
///
/// # Errors
///
/// Returns an error if any position has fewer than two elements or is not a
/// valid coordinate, or if a needed tile cannot be fetched.
///
/// # Example
///
/// ```ignore
/// let line: Geometry = r#"{
///     "type": "LineString",
///     "coordinates": [[138.5, 35.5], [138.6, 35.6]]
/// }"#.parse().unwrap();
///
/// let enriched = add_elevations_to_geometry(&resolver, line).await?;
/// // [[138.5, 35.5, 512.3], [138.6, 35.6, 748.9]]
/// ```
pub async fn add_elevations_to_geometry(
    resolver: &ElevationResolver,
    mut geometry: Geometry,
) -> Result<Geometry> {
    enrich(resolver, vec![&mut geometry.value]).await?;
    Ok(geometry)
}

/// Add elevations to every geometry of a GeoJSON document.
///
/// Features without a geometry are left untouched.
pub async fn add_elevations_to_geojson(
    resolver: &ElevationResolver,
    mut geojson: GeoJson,
) -> Result<GeoJson> {
    let mut values: Vec<&mut GeoJsonValue> = Vec::new();
    match &mut geojson {
        GeoJson::Geometry(geometry) => values.push(&mut geometry.value),
        GeoJson::Feature(feature) => values.extend(feature.geometry.as_mut().map(|g| &mut g.value)),
        GeoJson::FeatureCollection(collection) => values.extend(
            collection
                .features
                .iter_mut()
                .filter_map(|f| f.geometry.as_mut().map(|g| &mut g.value)),
        ),
    }

    enrich(resolver, values).await?;
    Ok(geojson)
}

/// Resolve every position of `values` as one batch and write the results
/// back as Z coordinates.
async fn enrich(resolver: &ElevationResolver, mut values: Vec<&mut GeoJsonValue>) -> Result<()> {
    let mut points = Vec::new();
    for value in values.iter_mut() {
        for_each_position(value, &mut |position| {
            let lon = position.first().copied().unwrap_or(f64::NAN);
            let lat = position.get(1).copied().unwrap_or(f64::NAN);
            points.push(LatLng::new(lat, lon));
        });
    }

    let mut elevations = resolver.get_elevations(&points).await?.into_iter();

    for value in values.iter_mut() {
        for_each_position(value, &mut |position| {
            if let Some(elevation) = elevations.next() {
                position.truncate(2);
                position.push(elevation as f64);
            }
        });
    }

    Ok(())
}

/// Visit every position of a geometry value in document order.
fn for_each_position(value: &mut GeoJsonValue, f: &mut dyn FnMut(&mut Vec<f64>)) {
    match value {
        GeoJsonValue::Point(position) => f(position),
        GeoJsonValue::MultiPoint(positions) | GeoJsonValue::LineString(positions) => {
            positions.iter_mut().for_each(|p| f(p))
        }
        GeoJsonValue::MultiLineString(lines) | GeoJsonValue::Polygon(lines) => {
            lines.iter_mut().flatten().for_each(|p| f(p))
        }
        GeoJsonValue::MultiPolygon(polygons) => {
            polygons.iter_mut().flatten().flatten().for_each(|p| f(p))
        }
        GeoJsonValue::GeometryCollection(geometries) => {
            for geometry in geometries {
                for_each_position(&mut geometry.value, f);
            }
        }
    }
}

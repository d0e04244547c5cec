//! Structural checks for the `geometry` field.

use serde_json::Value;

use crate::error::{ImportError, Result};

/// Geometry types accepted on import.
pub const SUPPORTED_GEOMETRY_TYPES: &[&str] = &[
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
];

/// Validate a geometry value of the resource `identifier`.
///
/// Order of checks: shape, type support, coordinate presence, coordinate
/// structure.
pub fn validate_geometry(identifier: &str, geometry: &Value) -> Result<()> {
    let Some(object) = geometry.as_object() else {
        return Err(ImportError::InvalidGeometry(identifier.to_string()));
    };
    let Some(geometry_type) = object.get("type").and_then(Value::as_str) else {
        return Err(ImportError::InvalidGeometry(identifier.to_string()));
    };
    if !SUPPORTED_GEOMETRY_TYPES.contains(&geometry_type) {
        return Err(ImportError::UnsupportedGeometryType(
            geometry_type.to_string(),
        ));
    }
    let coordinates = match object.get("coordinates") {
        None | Some(Value::Null) => {
            return Err(ImportError::MissingCoordinates(identifier.to_string()))
        }
        Some(c) => c,
    };

    if coordinates_valid(geometry_type, coordinates) {
        Ok(())
    } else {
        Err(ImportError::InvalidCoordinates(geometry_type.to_string()))
    }
}

fn coordinates_valid(geometry_type: &str, coordinates: &Value) -> bool {
    match geometry_type {
        "Point" => is_position(coordinates),
        "MultiPoint" => non_empty_list_of(coordinates, is_position),
        "LineString" => is_line(coordinates),
        "MultiLineString" => non_empty_list_of(coordinates, is_line),
        "Polygon" => is_polygon(coordinates),
        "MultiPolygon" => non_empty_list_of(coordinates, is_polygon),
        _ => false,
    }
}

/// `[x, y]` or `[x, y, z]` with finite numbers.
fn is_position(value: &Value) -> bool {
    match value.as_array() {
        Some(items) if (2..=3).contains(&items.len()) => items
            .iter()
            .all(|n| n.as_f64().is_some_and(f64::is_finite)),
        _ => false,
    }
}

fn is_line(value: &Value) -> bool {
    matches!(value.as_array(), Some(points) if points.len() >= 2 && points.iter().all(is_position))
}

/// A ring needs at least three positions.
fn is_ring(value: &Value) -> bool {
    matches!(value.as_array(), Some(points) if points.len() >= 3 && points.iter().all(is_position))
}

fn is_polygon(value: &Value) -> bool {
    non_empty_list_of(value, is_ring)
}

fn non_empty_list_of(value: &Value, item: fn(&Value) -> bool) -> bool {
    matches!(value.as_array(), Some(items) if !items.is_empty() && items.iter().all(item))
}

//! Bounding box derivation from user-supplied `GeoJSON` documents.
//!
//! Only `Polygon` and `MultiPolygon` geometries contribute, and only the
//! exterior (first) ring of each polygon is consulted. Holes can never
//! extend a polygon's extent, so they are ignored.

use geojson::{GeoJson, Position};

use crate::{BoundingBox, CatalogError};

/// Parses a `GeoJSON` document from pasted text.
///
/// # Errors
///
/// Returns [`CatalogError::Parse`] if the text is not valid `GeoJSON`.
pub fn parse_geometry_document(text: &str) -> Result<GeoJson, CatalogError> {
    text.trim()
        .parse::<GeoJson>()
        .map_err(|e| CatalogError::Parse {
            message: e.to_string(),
        })
}

/// Parses a `GeoJSON` document from uploaded file bytes.
///
/// # Errors
///
/// Returns [`CatalogError::Parse`] if the bytes are not UTF-8 or not valid
/// `GeoJSON`.
pub fn parse_geometry_bytes(bytes: &[u8]) -> Result<GeoJson, CatalogError> {
    let text = std::str::from_utf8(bytes).map_err(|e| CatalogError::Parse {
        message: format!("file is not UTF-8: {e}"),
    })?;
    parse_geometry_document(text)
}

/// Computes the bounding box of every polygon exterior ring in a document.
///
/// Accepts a `FeatureCollection`, a single `Feature`, or a bare geometry.
/// Features with other geometry types are skipped.
///
/// # Errors
///
/// Returns [`CatalogError::Parse`] if the document has no polygon
/// coordinates or a position has fewer than two ordinates, and
/// [`CatalogError::Filter`] if the resulting box is outside the geographic
/// range.
pub fn bbox_from_document(document: &GeoJson) -> Result<BoundingBox, CatalogError> {
    let mut positions: Vec<&Position> = Vec::new();

    match document {
        GeoJson::FeatureCollection(collection) => {
            for feature in &collection.features {
                if let Some(geometry) = &feature.geometry {
                    collect_exterior_positions(&geometry.value, &mut positions);
                }
            }
        }
        GeoJson::Feature(feature) => {
            if let Some(geometry) = &feature.geometry {
                collect_exterior_positions(&geometry.value, &mut positions);
            }
        }
        GeoJson::Geometry(geometry) => collect_exterior_positions(&geometry.value, &mut positions),
    }

    if positions.is_empty() {
        return Err(CatalogError::Parse {
            message: "document contains no Polygon or MultiPolygon coordinates".to_string(),
        });
    }

    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    for position in positions {
        let (Some(&x), Some(&y)) = (position.first(), position.get(1)) else {
            return Err(CatalogError::Parse {
                message: format!("position {position:?} has fewer than two ordinates"),
            });
        };
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }

    log::debug!("Derived bounding box [{min_x}, {min_y}, {max_x}, {max_y}] from GeoJSON");

    Ok(BoundingBox::new(min_x, min_y, max_x, max_y)?)
}

/// Pushes the positions of each polygon's first ring, flattening
/// `MultiPolygon` parts.
fn collect_exterior_positions<'a>(value: &'a geojson::Value, out: &mut Vec<&'a Position>) {
    match value {
        geojson::Value::Polygon(rings) => {
            if let Some(exterior) = rings.first() {
                out.extend(exterior);
            }
        }
        geojson::Value::MultiPolygon(polygons) => {
            for rings in polygons {
                if let Some(exterior) = rings.first() {
                    out.extend(exterior);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_bbox(bbox: BoundingBox, expected: [f64; 4]) {
        let actual: [f64; 4] = bbox.into();
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-12, "expected {expected:?}, got {actual:?}");
        }
    }

    #[test]
    fn derives_bbox_from_polygon_collection() {
        let doc = parse_geometry_document(
            r#"{
                "type": "FeatureCollection",
                "features": [
                    { "type": "Feature", "properties": {}, "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[0.0, 0.0], [2.0, 0.5], [1.0, 3.0], [0.0, 0.0]]]
                    }},
                    { "type": "Feature", "properties": {}, "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[-4.0, 1.0], [-3.0, -2.5], [-3.5, 1.5], [-4.0, 1.0]]]
                    }}
                ]
            }"#,
        )
        .unwrap();

        assert_bbox(bbox_from_document(&doc).unwrap(), [-4.0, -2.5, 2.0, 3.0]);
    }

    #[test]
    fn ignores_holes() {
        // The hole pokes outside the exterior ring; it must not widen the box.
        let doc = parse_geometry_document(
            r#"{
                "type": "Polygon",
                "coordinates": [
                    [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]],
                    [[20.0, 20.0], [21.0, 20.0], [21.0, 21.0], [20.0, 20.0]]
                ]
            }"#,
        )
        .unwrap();

        assert_bbox(bbox_from_document(&doc).unwrap(), [0.0, 0.0, 10.0, 10.0]);
    }

    #[test]
    fn flattens_multipolygon_parts() {
        let doc = parse_geometry_document(
            r#"{
                "type": "Feature",
                "properties": null,
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[30.0, 10.0], [31.0, 10.0], [31.0, 11.0], [30.0, 10.0]]],
                        [[[-5.0, -6.0], [-4.0, -6.0], [-4.0, -5.0], [-5.0, -6.0]]]
                    ]
                }
            }"#,
        )
        .unwrap();

        assert_bbox(bbox_from_document(&doc).unwrap(), [-5.0, -6.0, 31.0, 11.0]);
    }

    #[test]
    fn skips_non_polygon_features() {
        let doc = parse_geometry_document(
            r#"{
                "type": "FeatureCollection",
                "features": [
                    { "type": "Feature", "properties": {}, "geometry": { "type": "Point", "coordinates": [100.0, 50.0] } },
                    { "type": "Feature", "properties": {}, "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[1.0, 1.0], [2.0, 1.0], [2.0, 2.0], [1.0, 1.0]]]
                    }}
                ]
            }"#,
        )
        .unwrap();

        assert_bbox(bbox_from_document(&doc).unwrap(), [1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn rejects_document_without_polygons() {
        let doc = parse_geometry_document(
            r#"{ "type": "FeatureCollection", "features": [] }"#,
        )
        .unwrap();
        assert!(matches!(
            bbox_from_document(&doc),
            Err(CatalogError::Parse { .. })
        ));
    }

    #[test]
    fn rejects_malformed_text() {
        assert!(matches!(
            parse_geometry_document("{ not json"),
            Err(CatalogError::Parse { .. })
        ));
        assert!(matches!(
            parse_geometry_bytes(&[0xff, 0xfe, 0x00]),
            Err(CatalogError::Parse { .. })
        ));
    }
}

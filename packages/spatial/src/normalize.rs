//! Normalizes raw [`MetadataRecord`]s into [`NormalizedRecord`] rows.
//!
//! Per record, in this order:
//!
//! 1. flatten non-reserved top-level keys into `properties`;
//! 2. parse the `geojson` footprint as an EPSG:4326 geometry;
//! 3. project to Web Mercator, measure the area, project back;
//! 4. replace the geometry with its envelope.
//!
//! Steps 3 and 4 only run when [`NormalizeOptions::compute_area`] is set.
//! The area must be measured before simplification, otherwise every record
//! would report the area of its envelope.

use std::collections::BTreeMap;

use aerial_meta_catalog_models::{GEOMETRY_KEY, MetadataRecord, PROPERTIES_KEY, is_reserved_key};
use geo::{BoundingRect as _, Geometry};

use crate::NormalizedRecord;
use crate::projection::{project_to_geographic, project_to_web_mercator};

/// Options for [`normalize_records`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Measure footprint areas and reduce geometries to envelopes. When
    /// unset, footprints are kept as-is and no area is computed.
    pub compute_area: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self { compute_area: true }
    }
}

/// Splits a raw record into its flattened attributes and its footprint.
///
/// Every top-level key outside the reserved envelope is copied into the
/// `properties` block unless `properties` already has that key. A missing
/// or non-object `properties` block starts out empty.
#[must_use]
pub fn flatten_record(
    record: MetadataRecord,
) -> (BTreeMap<String, serde_json::Value>, Option<serde_json::Value>) {
    let mut fields = record.into_fields();

    let mut properties: BTreeMap<String, serde_json::Value> = match fields.remove(PROPERTIES_KEY) {
        Some(serde_json::Value::Object(map)) => map.into_iter().collect(),
        _ => BTreeMap::new(),
    };
    let geometry = fields.remove(GEOMETRY_KEY).filter(|v| !v.is_null());

    for (key, value) in fields {
        if is_reserved_key(&key) {
            continue;
        }
        properties.entry(key).or_insert(value);
    }

    (properties, geometry)
}

/// Parses a `GeoJSON` geometry object into a [`Geometry`].
fn parse_footprint(value: serde_json::Value) -> Option<Geometry<f64>> {
    let geometry: geojson::Geometry = serde_json::from_value(value).ok()?;
    geometry.try_into().ok()
}

/// Computes the envelope of a geometry as a polygon.
fn envelope(geometry: &Geometry<f64>) -> Option<Geometry<f64>> {
    geometry
        .bounding_rect()
        .map(|rect| Geometry::Polygon(rect.to_polygon()))
}

/// Normalizes a single record.
#[must_use]
pub fn normalize_record(record: MetadataRecord, options: NormalizeOptions) -> NormalizedRecord {
    let id = record
        .get("_id")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("<unknown>")
        .to_string();
    let (attributes, footprint) = flatten_record(record);

    let Some(footprint) = footprint.and_then(parse_footprint) else {
        log::warn!("Record {id} has no usable footprint geometry");
        return NormalizedRecord {
            attributes,
            geometry: None,
            area_sqm: None,
        };
    };

    if !options.compute_area {
        return NormalizedRecord {
            attributes,
            geometry: Some(footprint),
            area_sqm: None,
        };
    }

    let projected = project_to_web_mercator(&footprint);
    let area_sqm = geo::Area::unsigned_area(&projected);
    let geographic = project_to_geographic(&projected);

    NormalizedRecord {
        attributes,
        geometry: envelope(&geographic),
        area_sqm: Some(area_sqm),
    }
}

/// Normalizes a batch of raw records.
#[must_use]
pub fn normalize_records(
    records: Vec<MetadataRecord>,
    options: NormalizeOptions,
) -> Vec<NormalizedRecord> {
    let total = records.len();
    let normalized: Vec<NormalizedRecord> = records
        .into_iter()
        .map(|record| normalize_record(record, options))
        .collect();

    let without_geometry = normalized.iter().filter(|r| r.geometry.is_none()).count();
    log::info!(
        "Normalized {total} records ({without_geometry} without geometry, area {})",
        if options.compute_area {
            "computed"
        } else {
            "skipped"
        }
    );

    normalized
}

#[cfg(test)]
mod tests {
    use geo::{Area as _, BoundingRect as _};

    use super::*;
    use crate::projection::web_mercator_area;

    fn record(value: serde_json::Value) -> MetadataRecord {
        serde_json::from_value(value).unwrap()
    }

    fn triangle_record() -> MetadataRecord {
        record(serde_json::json!({
            "_id": "tri",
            "platform": "uav",
            "uploaded_at": "2021-04-02T10:00:00.000Z",
            "properties": { "sensor": "DJI" },
            "bbox": [0.0, 0.0, 1.0, 1.0],
            "footprint": "POLYGON((0 0,1 0,0 1,0 0))",
            "user": { "name": "someone" },
            "meta_uri": "https://example.com/meta.json",
            "__v": 0,
            "geojson": {
                "type": "Polygon",
                "coordinates": [[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.0, 0.0]]]
            }
        }))
    }

    #[test]
    fn flattens_non_reserved_top_level_keys() {
        let (attrs, geometry) = flatten_record(triangle_record());

        assert_eq!(attrs["platform"], "uav");
        assert_eq!(attrs["sensor"], "DJI");
        assert_eq!(attrs["_id"], "tri");
        for reserved in ["bbox", "footprint", "user", "meta_uri", "__v", "geojson", "properties"] {
            assert!(!attrs.contains_key(reserved), "{reserved} leaked into attributes");
        }
        assert!(geometry.is_some());
    }

    #[test]
    fn never_overwrites_existing_properties() {
        let (attrs, _) = flatten_record(record(serde_json::json!({
            "platform": "satellite",
            "title": "top-level title",
            "properties": { "platform": "uav" }
        })));

        assert_eq!(attrs["platform"], "uav");
        assert_eq!(attrs["title"], "top-level title");
    }

    #[test]
    fn creates_missing_properties_block() {
        let (attrs, geometry) = flatten_record(record(serde_json::json!({
            "platform": "aircraft",
            "geojson": null
        })));

        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs["platform"], "aircraft");
        assert!(geometry.is_none());
    }

    #[test]
    fn measures_footprint_before_envelope() {
        let normalized = normalize_record(triangle_record(), NormalizeOptions::default());

        let area = normalized.area_sqm.unwrap();
        let envelope = normalized.geometry.unwrap();
        let envelope_area = web_mercator_area(&envelope);

        // A right triangle covers roughly half of its envelope.
        assert!(area < envelope_area);
        assert!((area / envelope_area - 0.5).abs() < 0.01);
    }

    #[test]
    fn envelope_is_axis_aligned_rectangle() {
        let normalized = normalize_record(triangle_record(), NormalizeOptions::default());
        let Some(Geometry::Polygon(poly)) = normalized.geometry else {
            panic!("expected envelope polygon");
        };

        let rect = poly.bounding_rect().unwrap();
        assert!((rect.min().x - 0.0).abs() < 1e-9);
        assert!((rect.max().x - 1.0).abs() < 1e-9);
        assert!((rect.max().y - 1.0).abs() < 1e-9);
        assert!((poly.unsigned_area() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn light_mode_keeps_footprint_and_skips_area() {
        let options = NormalizeOptions {
            compute_area: false,
        };
        let normalized = normalize_record(triangle_record(), options);

        assert!(normalized.area_sqm.is_none());
        let footprint = normalized.geometry.unwrap();
        assert!((footprint.unsigned_area() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn keeps_records_without_geometry() {
        let records = vec![
            triangle_record(),
            record(serde_json::json!({ "_id": "bad", "geojson": { "type": "Nope" } })),
        ];
        let normalized = normalize_records(records, NormalizeOptions::default());

        assert_eq!(normalized.len(), 2);
        assert!(normalized[1].geometry.is_none());
        assert!(normalized[1].area_sqm.is_none());
        assert_eq!(normalized[1].attributes["_id"], "bad");
    }

    #[test]
    fn normalizes_multipolygon_footprints() {
        let normalized = normalize_record(
            record(serde_json::json!({
                "geojson": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]],
                        [[[2.0, 0.0], [3.0, 0.0], [3.0, 1.0], [2.0, 1.0], [2.0, 0.0]]]
                    ]
                }
            })),
            NormalizeOptions::default(),
        );

        let area = normalized.area_sqm.unwrap();
        let envelope_area = web_mercator_area(&normalized.geometry.unwrap());
        // Two unit squares inside a 3x1 envelope.
        assert!((area / envelope_area - 2.0 / 3.0).abs() < 1e-3);
    }
}

//! `GeoJSON` and CSV export of normalized records.

use std::path::Path;

use geo::Geometry;

use crate::{AREA_COLUMN, NormalizedRecord, SpatialError, columns, display_value};

/// Name of the geometry column in CSV exports.
pub const GEOMETRY_COLUMN: &str = "geometry";

/// Builds a `GeoJSON` `FeatureCollection` with one feature per record.
/// Feature properties are the flattened attributes plus [`AREA_COLUMN`].
#[must_use]
pub fn to_feature_collection(records: &[NormalizedRecord]) -> geojson::FeatureCollection {
    let features = records
        .iter()
        .map(|record| {
            let mut properties: serde_json::Map<String, serde_json::Value> = record
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            if record.area_sqm.is_some() {
                properties.insert(AREA_COLUMN.to_string(), record.value(AREA_COLUMN));
            }

            geojson::Feature {
                bbox: None,
                geometry: record
                    .geometry
                    .as_ref()
                    .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Writes the records to `path` as a `GeoJSON` `FeatureCollection`.
///
/// # Errors
///
/// Returns [`SpatialError`] if serialization or the file write fails.
pub fn write_geojson(path: &Path, records: &[NormalizedRecord]) -> Result<(), SpatialError> {
    let body = serde_json::to_string(&to_feature_collection(records))?;
    std::fs::write(path, body)?;
    log::info!("Wrote {} features to {}", records.len(), path.display());
    Ok(())
}

/// Writes the records as CSV: one column per table column, plus a
/// [`GEOMETRY_COLUMN`] holding WKT.
///
/// # Errors
///
/// Returns [`SpatialError`] if writing fails.
pub fn write_csv_to<W: std::io::Write>(
    writer: W,
    records: &[NormalizedRecord],
) -> Result<(), SpatialError> {
    let columns = columns(records);
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header: Vec<&str> = columns.iter().map(String::as_str).collect();
    header.push(GEOMETRY_COLUMN);
    csv_writer.write_record(&header)?;

    for record in records {
        let mut row: Vec<String> = columns
            .iter()
            .map(|column| display_value(&record.value(column)))
            .collect();
        row.push(record.geometry.as_ref().map_or_else(String::new, to_wkt));
        csv_writer.write_record(&row)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Writes the records to `path` as CSV.
///
/// # Errors
///
/// Returns [`SpatialError`] if the file cannot be created or written.
pub fn write_csv(path: &Path, records: &[NormalizedRecord]) -> Result<(), SpatialError> {
    let file = std::fs::File::create(path)?;
    write_csv_to(file, records)?;
    log::info!("Wrote {} rows to {}", records.len(), path.display());
    Ok(())
}

/// Renders polygonal geometries as WKT. Other geometry types, which the
/// catalog does not produce for footprints, fall back to `GeoJSON` text.
#[must_use]
pub fn to_wkt(geometry: &Geometry<f64>) -> String {
    match geometry {
        Geometry::Polygon(polygon) => format!("POLYGON {}", polygon_body(polygon)),
        Geometry::MultiPolygon(multi) => {
            let parts: Vec<String> = multi.0.iter().map(polygon_body).collect();
            format!("MULTIPOLYGON ({})", parts.join(", "))
        }
        other => serde_json::to_string(&geojson::Geometry::new(geojson::Value::from(other)))
            .unwrap_or_default(),
    }
}

fn ring_body(ring: &geo::LineString<f64>) -> String {
    let coords: Vec<String> = ring
        .coords()
        .map(|coord| format!("{} {}", coord.x, coord.y))
        .collect();
    format!("({})", coords.join(", "))
}

fn polygon_body(polygon: &geo::Polygon<f64>) -> String {
    let rings: Vec<String> = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(ring_body)
        .collect();
    format!("({})", rings.join(", "))
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Normalization of raw catalog records into a flat spatial table.
//!
//! Raw catalog entries carry their attributes partly in a nested
//! `properties` block and partly as top-level keys, plus a `GeoJSON`
//! footprint. [`normalize::normalize_records`] flattens them into
//! [`NormalizedRecord`] rows, measures each footprint in Web Mercator
//! metres, and reduces the displayed geometry to its envelope. The
//! [`export`] module writes the resulting table as `GeoJSON` or CSV.

pub mod export;
pub mod normalize;
pub mod projection;

use std::collections::{BTreeMap, BTreeSet};

/// Column holding the projected footprint area in square metres.
pub const AREA_COLUMN: &str = "area_sqm";

/// Errors that can occur while exporting normalized records.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// One normalized catalog record.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    /// Flattened attributes (nested `properties` merged with non-reserved
    /// top-level keys).
    pub attributes: BTreeMap<String, serde_json::Value>,
    /// Displayed geometry in EPSG:4326. The envelope of the footprint when
    /// area computation is enabled, the untouched footprint otherwise.
    pub geometry: Option<geo::Geometry<f64>>,
    /// Area of the original footprint in Web Mercator square metres.
    pub area_sqm: Option<f64>,
}

impl NormalizedRecord {
    /// Returns the value of a table column.
    ///
    /// [`AREA_COLUMN`] resolves to the computed area when one exists.
    /// Unknown columns are `null`.
    #[must_use]
    pub fn value(&self, column: &str) -> serde_json::Value {
        if column == AREA_COLUMN
            && let Some(area) = self.area_sqm
        {
            return serde_json::Number::from_f64(area)
                .map_or(serde_json::Value::Null, serde_json::Value::Number);
        }
        self.attributes
            .get(column)
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    }
}

/// Returns the table columns for a record set: the sorted union of all
/// attribute keys, followed by [`AREA_COLUMN`] when any record has an area.
#[must_use]
pub fn columns(records: &[NormalizedRecord]) -> Vec<String> {
    let has_area = records.iter().any(|r| r.area_sqm.is_some());

    let mut keys: BTreeSet<&str> = BTreeSet::new();
    for record in records {
        keys.extend(record.attributes.keys().map(String::as_str));
    }
    if has_area {
        keys.remove(AREA_COLUMN);
    }

    let mut columns: Vec<String> = keys.into_iter().map(str::to_string).collect();
    if has_area {
        columns.push(AREA_COLUMN.to_string());
    }
    columns
}

/// Renders a JSON value as flat cell text: strings verbatim, `null` empty,
/// everything else as compact JSON.
#[must_use]
pub fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

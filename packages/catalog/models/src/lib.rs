#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Catalog query, bounding box, and raw metadata record types.
//!
//! These types describe the request side of the aerial imagery metadata
//! catalog (bounding box and acquisition date filters) and the raw shape of
//! the paginated responses. They carry no networking logic.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Number of records requested per catalog page.
pub const PAGE_LIMIT: u32 = 100;

/// Key holding the nested attribute block of a record.
pub const PROPERTIES_KEY: &str = "properties";

/// Key holding the `GeoJSON` footprint geometry of a record.
pub const GEOMETRY_KEY: &str = "geojson";

/// Top-level record keys that belong to the catalog envelope and are never
/// flattened into the attribute block.
pub const RESERVED_KEYS: &[&str] = &[
    PROPERTIES_KEY,
    "bbox",
    "footprint",
    "user",
    "projection",
    "meta_uri",
    "__v",
    GEOMETRY_KEY,
];

/// Returns `true` if `key` is part of the reserved record envelope.
#[must_use]
pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Errors raised when constructing query filters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    /// A bounding box coordinate is NaN or infinite.
    #[error("Bounding box contains a non-finite coordinate")]
    NonFinite,

    /// A bounding box minimum exceeds its maximum.
    #[error("Bounding box is inverted: min ({min_x}, {min_y}) exceeds max ({max_x}, {max_y})")]
    Inverted {
        /// Western edge.
        min_x: f64,
        /// Southern edge.
        min_y: f64,
        /// Eastern edge.
        max_x: f64,
        /// Northern edge.
        max_y: f64,
    },

    /// A bounding box lies outside `[-180,180]x[-90,90]`.
    #[error("Bounding box {0} lies outside the geographic range [-180,180]x[-90,90]")]
    OutOfRange(String),

    /// The date range starts after it ends.
    #[error("Date range is inverted: {from} is after {to}")]
    InvertedDates {
        /// Range start.
        from: NaiveDate,
        /// Range end.
        to: NaiveDate,
    },
}

/// A rectangular filter `(min_x, min_y, max_x, max_y)` in EPSG:4326.
///
/// Serialized as a four-number array, which is also the format of the
/// region bounding box resource.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl BoundingBox {
    /// Creates a validated bounding box.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] if a coordinate is non-finite, the box is
    /// inverted, or it exceeds the geographic coordinate range.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self, FilterError> {
        if ![min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite()) {
            return Err(FilterError::NonFinite);
        }
        if min_x > max_x || min_y > max_y {
            return Err(FilterError::Inverted {
                min_x,
                min_y,
                max_x,
                max_y,
            });
        }

        let bbox = Self {
            min_x,
            min_y,
            max_x,
            max_y,
        };

        if min_x < -180.0 || max_x > 180.0 || min_y < -90.0 || max_y > 90.0 {
            return Err(FilterError::OutOfRange(bbox.to_query_param()));
        }

        Ok(bbox)
    }

    #[must_use]
    pub const fn min_x(&self) -> f64 {
        self.min_x
    }

    #[must_use]
    pub const fn min_y(&self) -> f64 {
        self.min_y
    }

    #[must_use]
    pub const fn max_x(&self) -> f64 {
        self.max_x
    }

    #[must_use]
    pub const fn max_y(&self) -> f64 {
        self.max_y
    }

    /// Renders the box as four comma-joined coordinates for the `bbox`
    /// query parameter.
    #[must_use]
    pub fn to_query_param(&self) -> String {
        format!("{},{},{},{}", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

impl TryFrom<[f64; 4]> for BoundingBox {
    type Error = FilterError;

    fn try_from([min_x, min_y, max_x, max_y]: [f64; 4]) -> Result<Self, Self::Error> {
        Self::new(min_x, min_y, max_x, max_y)
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(bbox: BoundingBox) -> Self {
        [bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y]
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

/// An inclusive acquisition date range. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

impl DateRange {
    /// Creates a date range.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvertedDates`] if both bounds are set and
    /// `from` is after `to`.
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Self, FilterError> {
        if let (Some(from), Some(to)) = (from, to)
            && from > to
        {
            return Err(FilterError::InvertedDates { from, to });
        }
        Ok(Self { from, to })
    }

    /// Inclusive lower bound.
    #[must_use]
    pub const fn start(&self) -> Option<NaiveDate> {
        self.from
    }

    /// Inclusive upper bound.
    #[must_use]
    pub const fn end(&self) -> Option<NaiveDate> {
        self.to
    }

    /// Returns `true` when neither bound is set.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }
}

/// Filters for a single catalog search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CatalogQuery {
    /// Optional geographic filter.
    pub bbox: Option<BoundingBox>,
    /// Optional acquisition date filter.
    pub dates: DateRange,
    /// Records requested per page.
    pub limit: u32,
}

impl Default for CatalogQuery {
    fn default() -> Self {
        Self {
            bbox: None,
            dates: DateRange::default(),
            limit: PAGE_LIMIT,
        }
    }
}

impl CatalogQuery {
    #[must_use]
    pub fn new(bbox: Option<BoundingBox>, dates: DateRange) -> Self {
        Self {
            bbox,
            dates,
            ..Self::default()
        }
    }

    /// Sets the page size.
    #[must_use]
    pub const fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Returns `true` only when the bounding box and both date bounds are
    /// all unset, i.e. the query would scan the whole catalog.
    #[must_use]
    pub const fn is_unfiltered(&self) -> bool {
        self.bbox.is_none() && self.dates.is_open()
    }

    /// Builds the query parameters for the given 1-based page.
    #[must_use]
    pub fn to_params(&self, page: u32) -> Vec<(&'static str, String)> {
        let mut params = vec![("limit", self.limit.to_string())];

        if let Some(bbox) = &self.bbox {
            params.push(("bbox", bbox.to_query_param()));
        }
        if let Some(from) = self.dates.start() {
            params.push(("acquisition_from", from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = self.dates.end() {
            params.push(("acquisition_to", to.format("%Y-%m-%d").to_string()));
        }

        params.push(("page", page.to_string()));
        params
    }
}

/// A single raw catalog entry.
///
/// The catalog returns a fixed envelope of [`RESERVED_KEYS`] plus an open
/// set of caller-defined top-level keys, so the record is kept as a JSON
/// object rather than a fixed struct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataRecord(serde_json::Map<String, serde_json::Value>);

impl MetadataRecord {
    #[must_use]
    pub const fn new(fields: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(fields)
    }

    #[must_use]
    pub const fn fields(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.0
    }

    #[must_use]
    pub fn into_fields(self) -> serde_json::Map<String, serde_json::Value> {
        self.0
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Returns the footprint geometry, if present and not null.
    #[must_use]
    pub fn geometry(&self) -> Option<&serde_json::Value> {
        self.0.get(GEOMETRY_KEY).filter(|v| !v.is_null())
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for MetadataRecord {
    fn from(fields: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(fields)
    }
}

/// Pagination metadata reported with every catalog page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogMeta {
    /// Total number of records matching the whole query.
    pub found: u64,
    /// Page size used by the server.
    #[serde(default)]
    pub limit: u32,
    /// Page number echoed by the server.
    #[serde(default)]
    pub page: Option<u32>,
}

/// One page of catalog results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogPage {
    /// Records on this page.
    pub results: Vec<MetadataRecord>,
    /// Pagination metadata.
    pub meta: CatalogMeta,
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Bounding box resolution and paginated metadata fetching for the
//! `OpenAerialMap` imagery catalog.
//!
//! The [`region`] and [`geometry`] modules turn a user's area selection
//! (an ISO3 country code, an uploaded `GeoJSON` file, or pasted `GeoJSON`
//! text) into a [`BoundingBox`]. The [`fetch`] module pages through the
//! catalog until every matching [`MetadataRecord`] has been collected.

pub mod area;
pub mod fetch;
pub mod geometry;
pub mod progress;
pub mod region;

pub use aerial_meta_catalog_models::{
    BoundingBox, CatalogMeta, CatalogPage, CatalogQuery, DateRange, FilterError, MetadataRecord,
};

/// Errors that can occur while resolving areas or fetching catalog data.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Request to {url} failed with status {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// Returned status code.
        status: reqwest::StatusCode,
    },

    /// A response body was not the expected JSON shape.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A user-supplied geometry document could not be used.
    #[error("Invalid GeoJSON: {message}")]
    Parse {
        /// Description of what went wrong.
        message: String,
    },

    /// Reading an uploaded file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A bounding box or date filter was invalid.
    #[error("Invalid filter: {0}")]
    Filter(#[from] FilterError),
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Charting and ad-hoc querying over normalized catalog records.
//!
//! [`chart`] buckets records by upload time and counts them per category.
//! [`query`] runs a user-supplied, read-only SQL statement against the
//! records inside a throwaway in-memory `DuckDB` instance.

pub mod chart;
pub mod query;

use aerial_meta_analytics_models::UnsupportedOption;
use thiserror::Error;

/// Errors that can occur during analytics operations.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Chart parameters were invalid.
    #[error("Invalid chart configuration: {message}")]
    InvalidConfig {
        /// Description of what went wrong.
        message: String,
    },

    /// An ad-hoc query was rejected or failed.
    #[error("Query error: {message}")]
    Query {
        /// Description of what went wrong.
        message: String,
    },

    /// The embedded database failed while loading the table.
    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),
}

impl From<UnsupportedOption> for AnalyticsError {
    fn from(e: UnsupportedOption) -> Self {
        Self::InvalidConfig {
            message: e.to_string(),
        }
    }
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Chart aggregation and ad-hoc query result types.
//!
//! Defines the parameters and outputs of the upload-trend chart and the
//! generic tabular result returned by ad-hoc SQL queries.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// A chart option string did not name a supported value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported {option} '{value}'. Use {expected}.")]
pub struct UnsupportedOption {
    /// Which option was being parsed.
    pub option: &'static str,
    /// The rejected input.
    pub value: String,
    /// Human-readable list of accepted values.
    pub expected: &'static str,
}

fn unsupported_time_interval(value: &str) -> UnsupportedOption {
    UnsupportedOption {
        option: "time_interval",
        value: value.to_string(),
        expected: "'year' or 'month'",
    }
}

fn unsupported_chart_type(value: &str) -> UnsupportedOption {
    UnsupportedOption {
        option: "chart type",
        value: value.to_string(),
        expected: "'line' or 'bar'",
    }
}

/// Time bucket size for the upload-trend chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(
    serialize_all = "snake_case",
    ascii_case_insensitive,
    parse_err_ty = UnsupportedOption,
    parse_err_fn = unsupported_time_interval
)]
pub enum TimeGranularity {
    /// Calendar year buckets.
    Year,
    /// Calendar month buckets (`YYYY-MM`).
    Month,
}

impl TimeGranularity {
    /// Capitalized name used in chart titles.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::Year => "Year",
            Self::Month => "Month",
        }
    }
}

/// Chart rendering style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(
    serialize_all = "snake_case",
    ascii_case_insensitive,
    parse_err_ty = UnsupportedOption,
    parse_err_fn = unsupported_chart_type
)]
pub enum ChartKind {
    /// Line chart with point markers.
    Line,
    /// Grouped bar chart.
    Bar,
}

/// Parameters for the upload-trend chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartParams {
    /// Date-like column bucketed along the x axis.
    pub x_col: String,
    /// Categorical column that splits the counts into series.
    pub category_col: String,
    /// Rendering style.
    pub kind: ChartKind,
    /// Bucket size.
    pub granularity: TimeGranularity,
}

/// A time bucket on the chart's x axis.
///
/// Ordered chronologically; [`TimeBucket::Missing`] (a date that could not
/// be parsed) sorts after every real bucket.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeBucket {
    /// Calendar year.
    Year(i32),
    /// Calendar month formatted as `YYYY-MM`.
    Month(String),
    /// The source value was missing or not a date.
    Missing,
}

impl std::fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Year(year) => write!(f, "{year}"),
            Self::Month(month) => write!(f, "{month}"),
            Self::Missing => write!(f, "NaT"),
        }
    }
}

/// One aggregated `(bucket, category, count)` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartRow {
    /// Time bucket.
    pub bucket: TimeBucket,
    /// Category value, `None` when the record had no value.
    pub category: Option<String>,
    /// Number of records in the group.
    pub count: u64,
}

/// One chart series (all rows of a single category).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSeries {
    /// Category value shown in the legend.
    pub name: String,
    /// Buckets in ascending order.
    pub x: Vec<TimeBucket>,
    /// Counts aligned with `x`.
    pub y: Vec<u64>,
}

/// A renderable chart: title, axes, and per-category series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSpec {
    /// Chart title (e.g. `"platform Uploads by Year"`).
    pub title: String,
    /// Rendering style.
    pub kind: ChartKind,
    /// X axis label.
    pub x_label: String,
    /// Y axis label.
    pub y_label: String,
    /// Legend title (the category column).
    pub legend_label: String,
    /// One series per category.
    pub series: Vec<ChartSeries>,
    /// The aggregated rows the series were built from.
    pub rows: Vec<ChartRow>,
}

/// A single value in an ad-hoc query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// SQL `NULL`.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Text, or any value without a closer representation.
    Text(String),
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Rows returned by an ad-hoc query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names in result order.
    pub columns: Vec<String>,
    /// Row values aligned with `columns`.
    pub rows: Vec<Vec<Cell>>,
}

impl QueryResult {
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the cell at `row` in the named column.
    #[must_use]
    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(idx)
    }
}

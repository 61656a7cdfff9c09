//! Explorer configuration loaded from an optional TOML file.
//!
//! Every key is optional; anything missing falls back to the defaults
//! below.

use std::path::Path;
use std::time::Duration;

use aerial_meta_analytics::AnalyticsError;
use aerial_meta_analytics::query::DEFAULT_QUERY;
use aerial_meta_analytics_models::ChartParams;
use aerial_meta_catalog::fetch::DEFAULT_CATALOG_URL;
use aerial_meta_catalog::region::DEFAULT_REGIONS_URL;
use aerial_meta_catalog_models::PAGE_LIMIT;
use serde::{Deserialize, Serialize};

/// Errors that can occur while loading the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file was not valid TOML for [`Config`].
    #[error("Invalid config {path}: {source}")]
    Toml {
        /// Path that was parsed.
        path: String,
        /// Underlying error.
        source: toml::de::Error,
    },
}

/// Default chart settings. Chart type and interval stay strings so that an
/// unsupported value is reported when a chart is drawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartDefaults {
    pub x_col: String,
    pub y_col: String,
    pub chart_type: String,
    pub time_interval: String,
}

impl Default for ChartDefaults {
    fn default() -> Self {
        Self {
            x_col: "uploaded_at".to_string(),
            y_col: "platform".to_string(),
            chart_type: "line".to_string(),
            time_interval: "year".to_string(),
        }
    }
}

impl ChartDefaults {
    /// Parses these settings into chart parameters.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::InvalidConfig`] if the chart type or time
    /// interval is unsupported.
    pub fn to_params(&self) -> Result<ChartParams, AnalyticsError> {
        Ok(ChartParams {
            x_col: self.x_col.clone(),
            category_col: self.y_col.clone(),
            kind: self.chart_type.trim().parse()?,
            granularity: self.time_interval.trim().parse()?,
        })
    }
}

/// Explorer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Metadata search endpoint.
    pub catalog_url: String,
    /// URL of the ISO3 → bounding box mapping.
    pub regions_url: String,
    /// Records requested per page.
    pub page_limit: u32,
    /// Per-request timeout. `None` keeps the HTTP client default.
    pub request_timeout_secs: Option<u64>,
    /// Rows shown in the result preview.
    pub preview_rows: usize,
    pub chart: ChartDefaults,
    /// SQL offered for the ad-hoc query step.
    pub default_query: String,
    /// Measure footprint areas and reduce geometries to envelopes.
    pub compute_area: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            regions_url: DEFAULT_REGIONS_URL.to_string(),
            page_limit: PAGE_LIMIT,
            request_timeout_secs: None,
            preview_rows: 100,
            chart: ChartDefaults::default(),
            default_query: DEFAULT_QUERY.to_string(),
            compute_area: true,
        }
    }
}

impl Config {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML error if the text does not describe a [`Config`].
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Loads the configuration from `path`, or the defaults when no path is
    /// given.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&text).map_err(|source| ConfigError::Toml {
            path: path.display().to_string(),
            source,
        })?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Builds the HTTP client used for every remote request.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error if the client cannot be constructed.
    pub fn http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        let mut builder =
            reqwest::Client::builder().user_agent(concat!("aerial_meta/", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = self.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        builder.build()
    }
}

//! User-triggered operations shared by the interactive session and the
//! `fetch` subcommand.
//!
//! Chart and query failures are reported and swallowed so the session
//! keeps going. Fetch failures are returned to the caller.

use std::path::Path;

use aerial_meta_analytics::chart::{build_chart, to_html, to_plotly_json};
use aerial_meta_analytics::query::execute_query;
use aerial_meta_analytics_models::ChartParams;
use aerial_meta_catalog::CatalogError;
use aerial_meta_catalog::area::AreaSelection;
use aerial_meta_catalog::fetch::{HttpCatalog, unfiltered_warning};
use aerial_meta_catalog::region::RegionCatalog;
use aerial_meta_cli_utils::{IndicatifProgress, MultiProgress};
use aerial_meta_spatial::export::{write_csv, write_geojson};
use aerial_meta_spatial::normalize::NormalizeOptions;
use aerial_meta_spatial::{NormalizedRecord, SpatialError};

use crate::config::Config;
use crate::render;
use crate::session::Session;

/// Short description of where an area came from, shown in the status line.
#[must_use]
pub fn area_label(selection: &AreaSelection) -> String {
    match selection {
        AreaSelection::Region(code) => code.to_ascii_uppercase(),
        AreaSelection::UploadedFile(path) => path.display().to_string(),
        AreaSelection::PastedText(_) => "pasted GeoJSON".to_string(),
    }
}

/// Line to print before fetching when the session sets no area and no
/// dates, so the whole catalog would be downloaded.
#[must_use]
pub fn unfiltered_notice(session: &Session, page_limit: u32) -> Option<String> {
    unfiltered_warning(&session.query(page_limit)).map(|warning| format!("Warning: {warning}"))
}

/// Downloads the region bounding boxes. An unavailable resource yields an
/// empty catalog, which only disables region selection.
pub async fn load_regions(
    client: &reqwest::Client,
    config: &Config,
    multi: &MultiProgress,
) -> RegionCatalog {
    let progress = IndicatifProgress::spinner(multi, "Loading country bounding boxes...");
    let regions = RegionCatalog::load(client, &config.regions_url).await;
    progress.finish_and_clear();
    regions
}

/// Fetches and normalizes every record for the session's filters, then
/// prints the total and a preview.
///
/// # Errors
///
/// Returns the [`CatalogError`] that aborted the fetch; the session keeps
/// its previous records.
pub async fn fetch(
    session: &mut Session,
    client: &reqwest::Client,
    config: &Config,
    multi: &MultiProgress,
) -> Result<(), CatalogError> {
    let source = HttpCatalog::new(client.clone(), &config.catalog_url);
    let progress = IndicatifProgress::records_bar(multi, "Fetching metadata");
    let options = NormalizeOptions {
        compute_area: config.compute_area,
    };

    let result = session
        .fetch(&source, config.page_limit, options, &progress)
        .await;
    if result.is_err() {
        progress.finish_and_clear();
    }
    let count = result?;

    println!();
    println!("Total Features: {count}");
    if let Some(records) = session.records() {
        println!("{}", render::preview(records, config.preview_rows));
    }
    Ok(())
}

/// Builds the chart, prints its counts, and optionally writes it as a
/// Plotly HTML page (or JSON figure for a `.json` path).
pub fn chart(records: &[NormalizedRecord], params: &ChartParams, output: Option<&Path>) {
    let chart = match build_chart(records, params) {
        Ok(chart) => chart,
        Err(e) => {
            log::error!("Error creating chart: {e}");
            println!("Error creating chart: {e}");
            return;
        }
    };

    println!("{}", render::chart_counts(&chart));

    let Some(path) = output else {
        return;
    };
    let body = if path.extension().is_some_and(|ext| ext == "json") {
        to_plotly_json(&chart).to_string()
    } else {
        to_html(&chart)
    };
    match std::fs::write(path, body) {
        Ok(()) => println!("Chart written to {}", path.display()),
        Err(e) => {
            log::error!("Failed to write chart to {}: {e}", path.display());
            println!("Failed to write chart: {e}");
        }
    }
}

/// Runs an ad-hoc query and prints the result table.
pub fn query(records: &[NormalizedRecord], sql: &str) {
    match execute_query(records, sql) {
        Ok(result) => {
            println!("Query returned {} rows", result.len());
            println!("{}", render::query_result(&result));
        }
        Err(e) => {
            log::error!("Error executing query: {e}");
            println!("Error executing query: {e}");
        }
    }
}

/// Writes the full result set to the given export paths.
///
/// # Errors
///
/// Returns the first [`SpatialError`] encountered.
pub fn export(
    records: &[NormalizedRecord],
    geojson: Option<&Path>,
    csv: Option<&Path>,
) -> Result<(), SpatialError> {
    if let Some(path) = geojson {
        write_geojson(path, records)?;
        println!("GeoJSON written to {}", path.display());
    }
    if let Some(path) = csv {
        write_csv(path, records)?;
        println!("CSV written to {}", path.display());
    }
    Ok(())
}

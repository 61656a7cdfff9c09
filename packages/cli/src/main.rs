#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Explorer for the `OpenAerialMap` imagery metadata catalog.
//!
//! Without a subcommand this starts an interactive session: choose an area
//! and date range, fetch every matching record, then chart upload trends,
//! run SQL over the result set, or export it. The `fetch` subcommand runs
//! the same pipeline once from flags.
//!
//! Uses `indicatif-log-bridge` (via [`aerial_meta_cli_utils::init_logger`])
//! so log lines and progress bars share the terminal cleanly.

mod actions;
mod config;
mod interactive;
mod render;
mod session;

use std::path::PathBuf;

use aerial_meta_catalog::DateRange;
use aerial_meta_catalog::area::{AreaSelection, resolve};
use aerial_meta_catalog::region::RegionCatalog;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::session::Session;

#[derive(Parser)]
#[command(name = "aerial_meta", about = "Search OpenAerialMap imagery metadata")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch records once, print a preview and chart, and optionally query
    /// or export them
    Fetch {
        /// Country ISO3 code to use as the search area
        #[arg(long, conflicts_with = "geojson")]
        region: Option<String>,
        /// `GeoJSON` file whose polygons define the search area
        #[arg(long)]
        geojson: Option<PathBuf>,
        /// Earliest acquisition date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Latest acquisition date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Date column bucketed on the chart's x axis
        #[arg(long)]
        x_col: Option<String>,
        /// Category column charted as separate series
        #[arg(long)]
        y_col: Option<String>,
        /// Chart type: "line" or "bar"
        #[arg(long)]
        chart_type: Option<String>,
        /// Time bucket: "year" or "month"
        #[arg(long)]
        interval: Option<String>,
        /// SQL to run against the `data` table
        #[arg(long)]
        query: Option<String>,
        /// Write the result set as `GeoJSON`
        #[arg(long)]
        export_geojson: Option<PathBuf>,
        /// Write the result set as CSV
        #[arg(long)]
        export_csv: Option<PathBuf>,
        /// Write the chart as a Plotly HTML page (or JSON for `.json`)
        #[arg(long)]
        chart_html: Option<PathBuf>,
        /// Skip area measurement and keep original footprints
        #[arg(long)]
        no_area: bool,
    },
    /// List the available country codes
    Regions,
}

#[allow(clippy::too_many_lines)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = aerial_meta_cli_utils::init_logger();
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    let Some(command) = cli.command else {
        return interactive::run(&config, &multi).await;
    };

    match command {
        Commands::Regions => {
            let client = config.http_client()?;
            let regions = actions::load_regions(&client, &config, &multi).await;
            if regions.is_empty() {
                return Err("no regions available".into());
            }
            for code in regions.codes() {
                if let Some(bbox) = regions.get(code) {
                    println!("{code:<6} {bbox}");
                }
            }
        }
        Commands::Fetch {
            region,
            geojson,
            from,
            to,
            x_col,
            y_col,
            chart_type,
            interval,
            query,
            export_geojson,
            export_csv,
            chart_html,
            no_area,
        } => {
            if no_area {
                config.compute_area = false;
            }
            if let Some(x_col) = x_col {
                config.chart.x_col = x_col;
            }
            if let Some(y_col) = y_col {
                config.chart.y_col = y_col;
            }
            if let Some(chart_type) = chart_type {
                config.chart.chart_type = chart_type;
            }
            if let Some(interval) = interval {
                config.chart.time_interval = interval;
            }

            let client = config.http_client()?;
            let mut session = Session::new();
            session.set_dates(DateRange::new(from, to)?);

            let selection = match (region, geojson) {
                (Some(code), _) => Some(AreaSelection::Region(code)),
                (None, Some(path)) => Some(AreaSelection::UploadedFile(path)),
                (None, None) => None,
            };
            if let Some(selection) = selection {
                let regions = if matches!(selection, AreaSelection::Region(_)) {
                    actions::load_regions(&client, &config, &multi).await
                } else {
                    RegionCatalog::default()
                };
                let bbox = resolve(&selection, &regions)?;
                session.set_area(actions::area_label(&selection), bbox);
            }

            if let Some(notice) = actions::unfiltered_notice(&session, config.page_limit) {
                println!("{notice}");
            }
            actions::fetch(&mut session, &client, &config, &multi).await?;
            let records = session.records().unwrap_or_default();

            println!();
            match config.chart.to_params() {
                Ok(params) => actions::chart(records, &params, chart_html.as_deref()),
                Err(e) => {
                    log::error!("Error creating chart: {e}");
                    println!("Error creating chart: {e}");
                }
            }

            if let Some(sql) = query {
                println!();
                actions::query(records, &sql);
            }

            actions::export(records, export_geojson.as_deref(), export_csv.as_deref())?;
        }
    }

    Ok(())
}

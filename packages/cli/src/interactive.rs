//! Interactive terminal session.
//!
//! A menu loop over one [`Session`]: pick an area and date range, fetch,
//! then chart, query, or export the result set as often as needed. Every
//! action reports its own failure and returns to the menu.

use std::io::BufRead as _;
use std::path::{Path, PathBuf};

use aerial_meta_analytics_models::{ChartKind, ChartParams, TimeGranularity};
use aerial_meta_catalog::DateRange;
use aerial_meta_catalog::area::{AreaSelection, resolve};
use aerial_meta_catalog::region::RegionCatalog;
use aerial_meta_cli_utils::MultiProgress;
use chrono::NaiveDate;
use dialoguer::{Confirm, Input, Select};

use crate::actions;
use crate::config::Config;
use crate::render;
use crate::session::Session;

/// Top-level actions in the session menu.
enum MenuAction {
    ChooseArea,
    SetDates,
    Fetch,
    Preview,
    Chart,
    Query,
    Export,
    Quit,
}

impl MenuAction {
    const ALL: &[Self] = &[
        Self::ChooseArea,
        Self::SetDates,
        Self::Fetch,
        Self::Preview,
        Self::Chart,
        Self::Query,
        Self::Export,
        Self::Quit,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::ChooseArea => "Choose area",
            Self::SetDates => "Set acquisition date range",
            Self::Fetch => "Fetch data",
            Self::Preview => "Preview results",
            Self::Chart => "Chart uploads",
            Self::Query => "Run SQL query",
            Self::Export => "Export results",
            Self::Quit => "Quit",
        }
    }

    const fn needs_records(&self) -> bool {
        matches!(self, Self::Preview | Self::Chart | Self::Query | Self::Export)
    }
}

/// Ways of choosing the area, plus clearing it.
enum AreaMethod {
    Country,
    Upload,
    Paste,
    Clear,
}

impl AreaMethod {
    const ALL: &[Self] = &[Self::Country, Self::Upload, Self::Paste, Self::Clear];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Country => "Select Country (ISO3)",
            Self::Upload => "Upload GeoJSON",
            Self::Paste => "Paste GeoJSON",
            Self::Clear => "No area filter",
        }
    }
}

fn status_line(session: &Session) -> String {
    let area = session
        .area()
        .map_or_else(|| "none".to_string(), |a| format!("{} {}", a.label, a.bbox));
    let dates = session.dates();
    let fmt = |d: Option<NaiveDate>| d.map_or_else(|| "-".to_string(), |d| d.to_string());
    let records = session
        .records()
        .map_or_else(|| "not fetched".to_string(), |r| format!("{} records", r.len()));

    format!(
        "Area: {area} | Dates: {} to {} | Data: {records}",
        fmt(dates.start()),
        fmt(dates.end())
    )
}

/// Runs the interactive session until the user quits.
///
/// # Errors
///
/// Returns an error if the configuration is unusable or a prompt fails
/// (e.g. the terminal is closed).
pub async fn run(config: &Config, multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    println!("Search OpenAerialMap Metadata");
    println!();

    let client = config.http_client()?;
    let regions = actions::load_regions(&client, config, multi).await;
    if regions.is_empty() {
        println!("Country bounding boxes are unavailable; use a GeoJSON area instead.");
    }

    let mut session = Session::new();
    let labels: Vec<&str> = MenuAction::ALL.iter().map(MenuAction::label).collect();

    loop {
        println!();
        println!("{}", status_line(&session));

        let idx = Select::new()
            .with_prompt("What would you like to do?")
            .items(&labels)
            .default(0)
            .interact()?;
        let action = &MenuAction::ALL[idx];

        let records = session.records().filter(|r| !r.is_empty());
        if action.needs_records() && records.is_none() {
            println!("No data loaded. Fetch data first.");
            continue;
        }

        match action {
            MenuAction::ChooseArea => choose_area(&mut session, &regions)?,
            MenuAction::SetDates => set_dates(&mut session)?,
            MenuAction::Fetch => {
                if let Some(notice) = actions::unfiltered_notice(&session, config.page_limit) {
                    println!("{notice}");
                    let proceed = Confirm::new()
                        .with_prompt("Fetch the whole catalog anyway?")
                        .default(false)
                        .interact()?;
                    if !proceed {
                        continue;
                    }
                }
                if let Err(e) = actions::fetch(&mut session, &client, config, multi).await {
                    log::error!("Error fetching data: {e}");
                    println!("Error fetching data: {e}");
                }
            }
            MenuAction::Preview => {
                if let Some(records) = session.records() {
                    println!("Total Features: {}", records.len());
                    println!("{}", render::preview(records, config.preview_rows));
                }
            }
            MenuAction::Chart => {
                let (params, output) = prompt_chart(config)?;
                if let Some(records) = session.records() {
                    actions::chart(records, &params, output.as_deref());
                }
            }
            MenuAction::Query => {
                let sql: String = Input::new()
                    .with_prompt("SQL (table `data`)")
                    .default(config.default_query.clone())
                    .interact_text()?;
                if let Some(records) = session.records() {
                    actions::query(records, &sql);
                }
            }
            MenuAction::Export => {
                let geojson = prompt_optional_path("GeoJSON output path (empty to skip)")?;
                let csv = prompt_optional_path("CSV output path (empty to skip)")?;
                if let Some(records) = session.records()
                    && let Err(e) = actions::export(records, geojson.as_deref(), csv.as_deref())
                {
                    log::error!("Export failed: {e}");
                    println!("Export failed: {e}");
                }
            }
            MenuAction::Quit => break,
        }
    }

    Ok(())
}

fn choose_area(
    session: &mut Session,
    regions: &RegionCatalog,
) -> Result<(), Box<dyn std::error::Error>> {
    let labels: Vec<&str> = AreaMethod::ALL.iter().map(AreaMethod::label).collect();
    let idx = Select::new()
        .with_prompt("Area selection method")
        .items(&labels)
        .default(0)
        .interact()?;

    let selection = match AreaMethod::ALL[idx] {
        AreaMethod::Country => {
            if regions.is_empty() {
                println!("No countries available.");
                return Ok(());
            }
            let code: String = Input::new()
                .with_prompt(format!("Country ISO3 code ({} available)", regions.len()))
                .validate_with(|input: &String| -> Result<(), String> {
                    if regions.get(input).is_some() {
                        Ok(())
                    } else {
                        Err(format!("Unknown country code '{input}'"))
                    }
                })
                .interact_text()?;
            AreaSelection::Region(code.trim().to_ascii_uppercase())
        }
        AreaMethod::Upload => {
            let path: String = Input::new()
                .with_prompt("Path to a GeoJSON file")
                .interact_text()?;
            AreaSelection::UploadedFile(PathBuf::from(path.trim()))
        }
        AreaMethod::Paste => {
            println!("Paste GeoJSON, then an empty line to finish:");
            AreaSelection::PastedText(read_pasted_text()?)
        }
        AreaMethod::Clear => {
            session.clear_area();
            return Ok(());
        }
    };

    match resolve(&selection, regions) {
        Ok(bbox) => {
            println!("Bounding box: {bbox}");
            session.set_area(actions::area_label(&selection), bbox);
        }
        Err(e) => {
            log::error!("Invalid area: {e}");
            println!("Invalid area: {e}");
        }
    }
    Ok(())
}

fn read_pasted_text() -> Result<String, std::io::Error> {
    let mut text = String::new();
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            break;
        }
        text.push_str(&line);
        text.push('\n');
    }
    Ok(text)
}

fn set_dates(session: &mut Session) -> Result<(), Box<dyn std::error::Error>> {
    let from = prompt_optional_date("Start date YYYY-MM-DD (empty for none)")?;
    let to = prompt_optional_date("End date YYYY-MM-DD (empty for none)")?;

    match DateRange::new(from, to) {
        Ok(dates) => session.set_dates(dates),
        Err(e) => println!("Invalid date range: {e}"),
    }
    Ok(())
}

fn prompt_optional_date(prompt: &str) -> Result<Option<NaiveDate>, Box<dyn std::error::Error>> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .validate_with(|input: &String| -> Result<(), String> {
            if input.trim().is_empty() {
                return Ok(());
            }
            NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .interact_text()?;

    if input.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")?))
    }
}

fn prompt_optional_path(prompt: &str) -> Result<Option<PathBuf>, Box<dyn std::error::Error>> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;

    let input = input.trim();
    Ok((!input.is_empty()).then(|| Path::new(input).to_path_buf()))
}

fn prompt_chart(
    config: &Config,
) -> Result<(ChartParams, Option<PathBuf>), Box<dyn std::error::Error>> {
    let x_col: String = Input::new()
        .with_prompt("X-axis column")
        .default(config.chart.x_col.clone())
        .interact_text()?;
    let category_col: String = Input::new()
        .with_prompt("Y-axis (category) column")
        .default(config.chart.y_col.clone())
        .interact_text()?;

    let kinds = [ChartKind::Line, ChartKind::Bar];
    let kind_labels: Vec<String> = kinds.iter().map(ToString::to_string).collect();
    let kind_idx = Select::new()
        .with_prompt("Chart type")
        .items(&kind_labels)
        .default(usize::from(config.chart.chart_type == "bar"))
        .interact()?;

    let intervals = [TimeGranularity::Year, TimeGranularity::Month];
    let interval_labels: Vec<String> = intervals.iter().map(ToString::to_string).collect();
    let interval_idx = Select::new()
        .with_prompt("Time interval")
        .items(&interval_labels)
        .default(usize::from(config.chart.time_interval == "month"))
        .interact()?;

    let output = prompt_optional_path("Write chart HTML to (empty to skip)")?;

    Ok((
        ChartParams {
            x_col,
            category_col,
            kind: kinds[kind_idx],
            granularity: intervals[interval_idx],
        },
        output,
    ))
}

#[cfg(test)]
mod tests {
    use aerial_meta_catalog::BoundingBox;

    use super::*;

    #[test]
    fn menu_labels_are_unique() {
        let mut labels: Vec<&str> = MenuAction::ALL.iter().map(MenuAction::label).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), MenuAction::ALL.len());
    }

    #[test]
    fn only_data_actions_need_records() {
        assert!(!MenuAction::Fetch.needs_records());
        assert!(!MenuAction::ChooseArea.needs_records());
        assert!(MenuAction::Query.needs_records());
        assert!(MenuAction::Export.needs_records());
    }

    #[test]
    fn status_line_reflects_session() {
        let mut session = Session::new();
        assert_eq!(
            status_line(&session),
            "Area: none | Dates: - to - | Data: not fetched"
        );

        session.set_area("NPL", BoundingBox::new(80.0, 26.5, 88.0, 30.5).unwrap());
        let line = status_line(&session);
        assert!(line.starts_with("Area: NPL [80, 26.5, 88, 30.5]"), "{line}");
    }
}

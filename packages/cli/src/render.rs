//! Plain-text tables for the terminal.

use aerial_meta_analytics_models::{ChartSpec, QueryResult};
use aerial_meta_spatial::{NormalizedRecord, columns, display_value};
use tabled::builder::Builder;
use tabled::settings::object::Segment;
use tabled::settings::{Modify, Style, Width};

/// Cells wider than this are cut and suffixed with `…`.
const MAX_CELL_WIDTH: usize = 32;

/// Lays out a header and rows with a rounded border. Cell text is kept on
/// one line.
#[must_use]
pub fn format_table(header: &[String], rows: &[Vec<String>]) -> String {
    let one_line = |cell: &String| cell.replace(['\n', '\r'], " ");

    let mut builder = Builder::default();
    builder.push_record(header.iter().map(one_line));
    for row in rows {
        builder.push_record(row.iter().map(one_line));
    }

    let mut table = builder.build();
    table.with(Style::rounded()).with(
        Modify::new(Segment::all()).with(Width::truncate(MAX_CELL_WIDTH).suffix("…")),
    );
    table.to_string()
}

/// Renders the first `limit` records as a table.
#[must_use]
pub fn preview(records: &[NormalizedRecord], limit: usize) -> String {
    let header = columns(records);
    let rows: Vec<Vec<String>> = records
        .iter()
        .take(limit)
        .map(|record| {
            header
                .iter()
                .map(|column| display_value(&record.value(column)))
                .collect()
        })
        .collect();
    format_table(&header, &rows)
}

/// Renders a query result as a table.
#[must_use]
pub fn query_result(result: &QueryResult) -> String {
    let rows: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(ToString::to_string).collect())
        .collect();
    format_table(&result.columns, &rows)
}

/// Renders the aggregated chart counts as a table.
#[must_use]
pub fn chart_counts(chart: &ChartSpec) -> String {
    let header = vec![
        chart.x_label.clone(),
        chart.legend_label.clone(),
        chart.y_label.clone(),
    ];
    let rows: Vec<Vec<String>> = chart
        .rows
        .iter()
        .map(|row| {
            vec![
                row.bucket.to_string(),
                row.category.clone().unwrap_or_default(),
                row.count.to_string(),
            ]
        })
        .collect();
    format!("{}\n{}", chart.title, format_table(&header, &rows))
}

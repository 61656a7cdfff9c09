//! Upload-trend aggregation and Plotly chart rendering.
//!
//! Records are bucketed by a date-like column and counted per value of a
//! categorical column. Dates are parsed leniently: a value that is not a
//! recognizable date lands in [`TimeBucket::Missing`] instead of failing
//! the whole chart.

use std::collections::BTreeMap;

use aerial_meta_analytics_models::{
    ChartKind, ChartParams, ChartRow, ChartSeries, ChartSpec, TimeBucket, TimeGranularity,
};
use aerial_meta_spatial::{NormalizedRecord, columns};
use chrono::{DateTime, Datelike as _, NaiveDate, NaiveDateTime};

use crate::AnalyticsError;

/// X axis label used on every chart.
pub const X_LABEL: &str = "time_group";

/// Y axis label used on every chart.
pub const Y_LABEL: &str = "count";

/// Legend entry for records whose category value is missing.
pub const MISSING_CATEGORY: &str = "(none)";

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

/// Parses a date string in any of the formats the catalog is known to
/// emit. Returns `None` for anything unrecognized.
#[must_use]
pub fn parse_date_str(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.date());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    // Partial dates resolve to the first day of the period
    if s.len() == 7
        && let Ok(date) = NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
    {
        return Some(date);
    }
    if s.len() == 4
        && s.bytes().all(|b| b.is_ascii_digit())
        && let Ok(year) = s.parse::<i32>()
    {
        return NaiveDate::from_ymd_opt(year, 1, 1);
    }

    None
}

/// Coerces a table cell to a date. Only strings are considered.
#[must_use]
pub fn parse_date_lenient(value: &serde_json::Value) -> Option<NaiveDate> {
    value.as_str().and_then(parse_date_str)
}

/// Maps a date to its bucket at the given granularity.
#[must_use]
pub fn bucket_for(date: Option<NaiveDate>, granularity: TimeGranularity) -> TimeBucket {
    match (date, granularity) {
        (None, _) => TimeBucket::Missing,
        (Some(d), TimeGranularity::Year) => TimeBucket::Year(d.year()),
        (Some(d), TimeGranularity::Month) => TimeBucket::Month(d.format("%Y-%m").to_string()),
    }
}

fn category_of(record: &NormalizedRecord, column: &str) -> Option<String> {
    match record.value(column) {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn require_column(known: &[String], column: &str) -> Result<(), AnalyticsError> {
    if known.iter().any(|c| c == column) {
        Ok(())
    } else {
        Err(AnalyticsError::InvalidConfig {
            message: format!("Column '{column}' not found in the result set"),
        })
    }
}

/// Groups records by `(time bucket, category)` and counts each group.
///
/// Rows come back sorted by bucket, then category. Unparseable dates are
/// counted under [`TimeBucket::Missing`], which sorts last.
///
/// # Errors
///
/// Returns [`AnalyticsError::InvalidConfig`] if either column is absent
/// from a non-empty record set.
pub fn aggregate(
    records: &[NormalizedRecord],
    params: &ChartParams,
) -> Result<Vec<ChartRow>, AnalyticsError> {
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let known = columns(records);
    require_column(&known, &params.x_col)?;
    require_column(&known, &params.category_col)?;

    let mut groups: BTreeMap<(TimeBucket, Option<String>), u64> = BTreeMap::new();
    let mut unparsed = 0usize;

    for record in records {
        let date = parse_date_lenient(&record.value(&params.x_col));
        if date.is_none() {
            unparsed += 1;
        }
        let key = (
            bucket_for(date, params.granularity),
            category_of(record, &params.category_col),
        );
        *groups.entry(key).or_insert(0) += 1;
    }

    if unparsed > 0 {
        log::warn!(
            "{unparsed} of {} records have no parseable '{}' date",
            records.len(),
            params.x_col
        );
    }

    Ok(groups
        .into_iter()
        .map(|((bucket, category), count)| ChartRow {
            bucket,
            category,
            count,
        })
        .collect())
}

/// Aggregates the records and assembles a chart with one series per
/// category. Rows in the [`TimeBucket::Missing`] bucket are kept in
/// [`ChartSpec::rows`] but not plotted.
///
/// # Errors
///
/// Returns [`AnalyticsError::InvalidConfig`] if aggregation fails.
pub fn build_chart(
    records: &[NormalizedRecord],
    params: &ChartParams,
) -> Result<ChartSpec, AnalyticsError> {
    let rows = aggregate(records, params)?;

    let mut by_category: BTreeMap<String, ChartSeries> = BTreeMap::new();
    for row in rows.iter().filter(|r| r.bucket != TimeBucket::Missing) {
        let name = row
            .category
            .clone()
            .unwrap_or_else(|| MISSING_CATEGORY.to_string());
        let series = by_category.entry(name.clone()).or_insert_with(|| ChartSeries {
            name,
            x: Vec::new(),
            y: Vec::new(),
        });
        series.x.push(row.bucket.clone());
        series.y.push(row.count);
    }

    Ok(ChartSpec {
        title: format!(
            "{} Uploads by {}",
            params.category_col,
            params.granularity.title()
        ),
        kind: params.kind,
        x_label: X_LABEL.to_string(),
        y_label: Y_LABEL.to_string(),
        legend_label: params.category_col.clone(),
        series: by_category.into_values().collect(),
        rows,
    })
}

/// Renders the chart as a Plotly figure (`{"data": [...], "layout": {...}}`).
#[must_use]
pub fn to_plotly_json(chart: &ChartSpec) -> serde_json::Value {
    let data: Vec<serde_json::Value> = chart
        .series
        .iter()
        .map(|series| {
            let mut trace = serde_json::json!({
                "name": series.name,
                "x": series.x,
                "y": series.y,
            });
            match chart.kind {
                ChartKind::Line => {
                    trace["type"] = "scatter".into();
                    trace["mode"] = "lines+markers".into();
                }
                ChartKind::Bar => {
                    trace["type"] = "bar".into();
                }
            }
            trace
        })
        .collect();

    let mut layout = serde_json::json!({
        "title": { "text": chart.title },
        "xaxis": { "title": { "text": chart.x_label } },
        "yaxis": { "title": { "text": chart.y_label } },
        "legend": { "title": { "text": chart.legend_label } },
    });
    if chart.kind == ChartKind::Bar {
        layout["barmode"] = "relative".into();
    }

    serde_json::json!({ "data": data, "layout": layout })
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Renders the chart as a standalone HTML page that loads Plotly from its
/// CDN.
#[must_use]
pub fn to_html(chart: &ChartSpec) -> String {
    // `</` inside an inline script would end the script element early
    let figure = to_plotly_json(chart).to_string().replace("</", "<\\/");
    let title = escape_html(&chart.title);

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{PLOTLY_CDN}"></script>
</head>
<body>
<div id="chart" style="width:100%;height:90vh;"></div>
<script>
const figure = {figure};
Plotly.newPlot("chart", figure.data, figure.layout, {{ responsive: true }});
</script>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use aerial_meta_analytics_models::ChartKind;

    use super::*;

    fn record(uploaded_at: serde_json::Value, platform: serde_json::Value) -> NormalizedRecord {
        let mut attributes = BTreeMap::new();
        attributes.insert("uploaded_at".to_string(), uploaded_at);
        attributes.insert("platform".to_string(), platform);
        NormalizedRecord {
            attributes,
            geometry: None,
            area_sqm: None,
        }
    }

    fn params(granularity: TimeGranularity) -> ChartParams {
        ChartParams {
            x_col: "uploaded_at".to_string(),
            category_col: "platform".to_string(),
            kind: ChartKind::Line,
            granularity,
        }
    }

    fn sample() -> Vec<NormalizedRecord> {
        vec![
            record(serde_json::json!("2021-01-01"), serde_json::json!("B")),
            record(serde_json::json!("2020-03-01"), serde_json::json!("A")),
            record(serde_json::json!("2020-11-01"), serde_json::json!("A")),
        ]
    }

    #[test]
    fn groups_by_year_and_category() {
        let rows = aggregate(&sample(), &params(TimeGranularity::Year)).unwrap();

        assert_eq!(
            rows,
            vec![
                ChartRow {
                    bucket: TimeBucket::Year(2020),
                    category: Some("A".to_string()),
                    count: 2,
                },
                ChartRow {
                    bucket: TimeBucket::Year(2021),
                    category: Some("B".to_string()),
                    count: 1,
                },
            ]
        );
    }

    #[test]
    fn groups_by_month() {
        let rows = aggregate(&sample(), &params(TimeGranularity::Month)).unwrap();
        let buckets: Vec<String> = rows.iter().map(|r| r.bucket.to_string()).collect();
        assert_eq!(buckets, vec!["2020-03", "2020-11", "2021-01"]);
    }

    #[test]
    fn unparseable_dates_fall_into_missing_bucket() {
        let mut records = sample();
        records.push(record(serde_json::json!("not a date"), serde_json::json!("A")));
        records.push(record(serde_json::Value::Null, serde_json::json!("A")));

        let rows = aggregate(&records, &params(TimeGranularity::Year)).unwrap();
        let last = rows.last().unwrap();
        assert_eq!(last.bucket, TimeBucket::Missing);
        assert_eq!(last.count, 2);
    }

    #[test]
    fn rejects_unknown_granularity() {
        let err = "week".parse::<TimeGranularity>().map_err(AnalyticsError::from);
        assert!(matches!(err, Err(AnalyticsError::InvalidConfig { .. })));
    }

    #[test]
    fn rejects_unknown_column() {
        let mut p = params(TimeGranularity::Year);
        p.category_col = "sensor".to_string();
        assert!(matches!(
            aggregate(&sample(), &p),
            Err(AnalyticsError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn empty_records_aggregate_to_nothing() {
        assert!(aggregate(&[], &params(TimeGranularity::Year)).unwrap().is_empty());
    }

    #[test]
    fn parses_catalog_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2021, 4, 2);
        assert_eq!(parse_date_str("2021-04-02T10:00:00.000Z"), expected);
        assert_eq!(parse_date_str("2021-04-02T10:00:00+05:45"), expected);
        assert_eq!(parse_date_str("2021-04-02T10:00:00"), expected);
        assert_eq!(parse_date_str("2021-04-02 10:00:00.5"), expected);
        assert_eq!(parse_date_str("2021-04-02"), expected);
        assert_eq!(parse_date_str("2021-04"), NaiveDate::from_ymd_opt(2021, 4, 1));
        assert_eq!(parse_date_str("2021"), NaiveDate::from_ymd_opt(2021, 1, 1));
        assert_eq!(parse_date_str("April 2021"), None);
        assert_eq!(parse_date_lenient(&serde_json::json!(2021)), None);
    }

    #[test]
    fn numeric_categories_use_json_text() {
        let records = vec![record(serde_json::json!("2020-01-01"), serde_json::json!(3))];
        let rows = aggregate(&records, &params(TimeGranularity::Year)).unwrap();
        assert_eq!(rows[0].category.as_deref(), Some("3"));
    }

    #[test]
    fn builds_one_series_per_category() {
        let chart = build_chart(&sample(), &params(TimeGranularity::Year)).unwrap();

        assert_eq!(chart.title, "platform Uploads by Year");
        assert_eq!(chart.series.len(), 2);
        assert_eq!(chart.series[0].name, "A");
        assert_eq!(chart.series[0].x, vec![TimeBucket::Year(2020)]);
        assert_eq!(chart.series[0].y, vec![2]);
    }

    #[test]
    fn renders_plotly_traces() {
        let mut p = params(TimeGranularity::Month);
        let line = to_plotly_json(&build_chart(&sample(), &p).unwrap());
        assert_eq!(line["data"][0]["mode"], "lines+markers");
        assert_eq!(line["data"][0]["x"][0], "2020-03");
        assert_eq!(line["layout"]["title"]["text"], "platform Uploads by Month");

        p.kind = ChartKind::Bar;
        let bar = to_plotly_json(&build_chart(&sample(), &p).unwrap());
        assert_eq!(bar["data"][1]["type"], "bar");
    }

    #[test]
    fn html_escapes_script_terminators() {
        let records = vec![record(
            serde_json::json!("2020-01-01"),
            serde_json::json!("</script><b>"),
        )];
        let html = to_html(&build_chart(&records, &params(TimeGranularity::Year)).unwrap());
        assert!(!html.contains("</script><b>"));
        assert!(html.contains("Plotly.newPlot"));
    }
}

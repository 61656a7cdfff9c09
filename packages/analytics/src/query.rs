//! Sandboxed ad-hoc SQL over normalized records.
//!
//! Every call to [`execute_query`] opens a fresh in-memory `DuckDB`
//! database, loads the records into a table named [`QUERY_TABLE`] (the
//! geometry column is dropped), locks the database down, and runs exactly
//! one read-only statement. Nothing survives between calls.

use aerial_meta_analytics_models::{Cell, QueryResult};
use aerial_meta_spatial::{AREA_COLUMN, NormalizedRecord, columns, display_value};
use duckdb::types::{TimeUnit, Value};
use duckdb::{Connection, Statement};

use crate::AnalyticsError;

/// Name the record table is bound under.
pub const QUERY_TABLE: &str = "data";

/// Query offered when the user has not written one.
pub const DEFAULT_QUERY: &str = "SELECT platform AS platform, COUNT(*) AS count, \
                                 SUM(area_sqm) AS total_area_sqm \
                                 FROM data GROUP BY platform ORDER BY count DESC";

/// Leading keywords of the statements a query may consist of.
const READ_ONLY_KEYWORDS: &[&str] = &[
    "select",
    "with",
    "values",
    "from",
    "describe",
    "summarize",
    "show",
];

/// Rows per multi-row `INSERT`.
const INSERT_CHUNK_SIZE: usize = 500;

/// Storage type picked for a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Boolean,
    BigInt,
    Double,
    Varchar,
}

impl ColumnType {
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::BigInt => "BIGINT",
            Self::Double => "DOUBLE",
            Self::Varchar => "VARCHAR",
        }
    }

    /// Picks the narrowest type that holds every non-null value. Columns
    /// with only nulls, or with mixed kinds, are stored as text.
    pub fn infer<'a>(values: impl Iterator<Item = &'a serde_json::Value>) -> Self {
        let mut current: Option<Self> = None;

        for value in values {
            let kind = match value {
                serde_json::Value::Null => continue,
                serde_json::Value::Bool(_) => Self::Boolean,
                serde_json::Value::Number(n) if n.is_i64() => Self::BigInt,
                serde_json::Value::Number(_) => Self::Double,
                _ => return Self::Varchar,
            };
            current = Some(match (current, kind) {
                (None, k) => k,
                (Some(a), b) if a == b => a,
                (Some(Self::BigInt | Self::Double), Self::BigInt | Self::Double) => Self::Double,
                _ => return Self::Varchar,
            });
        }

        current.unwrap_or(Self::Varchar)
    }

    fn to_sql_value(self, value: &serde_json::Value) -> Value {
        match (self, value) {
            (_, serde_json::Value::Null) => Value::Null,
            (Self::Boolean, serde_json::Value::Bool(b)) => Value::Boolean(*b),
            (Self::BigInt, serde_json::Value::Number(n)) => n.as_i64().map_or(Value::Null, Value::BigInt),
            (Self::Double, serde_json::Value::Number(n)) => {
                n.as_f64().map_or(Value::Null, Value::Double)
            }
            (_, other) => Value::Text(display_value(other)),
        }
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Checks that `sql` is a single read-only statement and returns it with
/// any trailing semicolons removed.
///
/// Statements are split naively, so a semicolon inside a string literal is
/// also rejected.
///
/// # Errors
///
/// Returns [`AnalyticsError::Query`] if the statement is empty, contains
/// more than one statement, or does not start with a read-only keyword.
pub fn validate_query(sql: &str) -> Result<&str, AnalyticsError> {
    let statement = sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace());

    if statement.is_empty() {
        return Err(AnalyticsError::Query {
            message: "Query is empty".to_string(),
        });
    }
    if statement.contains(';') {
        return Err(AnalyticsError::Query {
            message: "Only a single statement is allowed".to_string(),
        });
    }

    let keyword = statement
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if !READ_ONLY_KEYWORDS.contains(&keyword.as_str()) {
        return Err(AnalyticsError::Query {
            message: format!(
                "Only read-only queries are allowed (got '{keyword}'). Start with one of: {}",
                READ_ONLY_KEYWORDS.join(", ")
            ),
        });
    }

    Ok(statement)
}

/// Picks the table columns, dropping names that collide case-insensitively
/// with an earlier column (`DuckDB` identifiers are case-insensitive).
fn table_columns(records: &[NormalizedRecord]) -> Vec<(String, ColumnType)> {
    let mut seen = std::collections::BTreeSet::new();
    let mut out = Vec::new();

    for name in columns(records) {
        if !seen.insert(name.to_lowercase()) {
            log::warn!("Skipping column '{name}': differs from another column only by case");
            continue;
        }
        let column_type = if name == AREA_COLUMN && records.iter().any(|r| r.area_sqm.is_some()) {
            ColumnType::Double
        } else {
            let values: Vec<serde_json::Value> = records.iter().map(|r| r.value(&name)).collect();
            ColumnType::infer(values.iter())
        };
        out.push((name, column_type));
    }

    out
}

/// Creates [`QUERY_TABLE`] and fills it with the records.
fn load_table(
    conn: &Connection,
    records: &[NormalizedRecord],
    table_columns: &[(String, ColumnType)],
) -> Result<(), AnalyticsError> {
    let definitions: Vec<String> = table_columns
        .iter()
        .map(|(name, ty)| format!("{} {}", quote_identifier(name), ty.sql()))
        .collect();
    conn.execute_batch(&format!(
        "CREATE TABLE {QUERY_TABLE} ({})",
        definitions.join(", ")
    ))?;

    let placeholders = format!("({})", vec!["?"; table_columns.len()].join(", "));

    for chunk in records.chunks(INSERT_CHUNK_SIZE) {
        let sql = format!(
            "INSERT INTO {QUERY_TABLE} VALUES {}",
            vec![placeholders.as_str(); chunk.len()].join(", ")
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut param_idx = 1usize;

        for record in chunk {
            for (name, ty) in table_columns {
                stmt.raw_bind_parameter(param_idx, ty.to_sql_value(&record.value(name)))?;
                param_idx += 1;
            }
        }

        stmt.raw_execute()?;
    }

    Ok(())
}

fn timestamp_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

fn time_of_day(unit: TimeUnit, value: i64) -> Option<String> {
    let micros = timestamp_micros(unit, value);
    let secs = u32::try_from(micros.div_euclid(1_000_000)).ok()?;
    let nanos = u32::try_from(micros.rem_euclid(1_000_000) * 1_000).ok()?;
    chrono::NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
        .map(|t| t.format("%H:%M:%S%.f").to_string())
}

fn interval_text(months: i32, days: i32, nanos: i64) -> String {
    let mut parts = Vec::new();
    if months != 0 {
        parts.push(format!("{months} months"));
    }
    if days != 0 {
        parts.push(format!("{days} days"));
    }
    if nanos != 0 || parts.is_empty() {
        let micros = (nanos / 1_000).unsigned_abs();
        let sign = if nanos < 0 { "-" } else { "" };
        let (hours, rest) = (micros / 3_600_000_000, micros % 3_600_000_000);
        let (minutes, rest) = (rest / 60_000_000, rest % 60_000_000);
        let (seconds, frac) = (rest / 1_000_000, rest % 1_000_000);
        let mut time = format!("{sign}{hours:02}:{minutes:02}:{seconds:02}");
        if frac != 0 {
            time.push_str(&format!(".{frac:06}"));
        }
        parts.push(time);
    }
    parts.join(" ")
}

fn blob_text(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                char::from(b).to_string()
            } else {
                format!("\\x{b:02X}")
            }
        })
        .collect()
}

/// Renders a value nested in a list, struct or map the way the `DuckDB`
/// shell prints it: strings quoted, `NULL` bare.
fn nested_text(value: Value) -> String {
    match value {
        Value::Text(s) | Value::Enum(s) => format!("'{}'", s.replace('\'', "''")),
        other => to_cell(other).to_string(),
    }
}

fn list_text(items: Vec<Value>) -> String {
    let items: Vec<String> = items.into_iter().map(nested_text).collect();
    format!("[{}]", items.join(", "))
}

/// Converts a `DuckDB` value into a result [`Cell`]. Nested values become
/// SQL-style text.
fn to_cell(value: Value) -> Cell {
    match value {
        Value::Null => Cell::Null,
        Value::Boolean(b) => Cell::Bool(b),
        Value::TinyInt(i) => Cell::Int(i64::from(i)),
        Value::SmallInt(i) => Cell::Int(i64::from(i)),
        Value::Int(i) => Cell::Int(i64::from(i)),
        Value::BigInt(i) => Cell::Int(i),
        Value::UTinyInt(i) => Cell::Int(i64::from(i)),
        Value::USmallInt(i) => Cell::Int(i64::from(i)),
        Value::UInt(i) => Cell::Int(i64::from(i)),
        Value::UBigInt(i) => i64::try_from(i).map_or_else(|_| Cell::Text(i.to_string()), Cell::Int),
        Value::HugeInt(i) => i64::try_from(i).map_or_else(|_| Cell::Text(i.to_string()), Cell::Int),
        Value::Float(f) => Cell::Float(f64::from(f)),
        Value::Double(f) => Cell::Float(f),
        Value::Decimal(d) => {
            let text = d.to_string();
            match text.parse::<f64>() {
                Ok(f) => Cell::Float(f),
                Err(_) => Cell::Text(text),
            }
        }
        Value::Text(s) | Value::Enum(s) => Cell::Text(s),
        Value::Blob(bytes) => Cell::Text(blob_text(&bytes)),
        Value::Date32(days) => chrono::NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_signed(chrono::TimeDelta::days(i64::from(days))))
            .map_or(Cell::Null, |d| Cell::Text(d.format("%Y-%m-%d").to_string())),
        Value::Timestamp(unit, v) => {
            chrono::DateTime::from_timestamp_micros(timestamp_micros(unit, v)).map_or(
                Cell::Null,
                |dt| Cell::Text(dt.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            )
        }
        Value::Time64(unit, v) => time_of_day(unit, v).map_or(Cell::Null, Cell::Text),
        Value::Interval {
            months,
            days,
            nanos,
        } => Cell::Text(interval_text(months, days, nanos)),
        Value::List(items) | Value::Array(items) => Cell::Text(list_text(items)),
        Value::Struct(fields) => {
            let fields: Vec<String> = fields
                .iter()
                .map(|(key, value)| format!("'{key}': {}", nested_text(value.clone())))
                .collect();
            Cell::Text(format!("{{{}}}", fields.join(", ")))
        }
        Value::Map(entries) => {
            let entries: Vec<String> = entries
                .iter()
                .map(|(key, value)| {
                    format!(
                        "{}={}",
                        nested_text(key.clone()),
                        nested_text(value.clone())
                    )
                })
                .collect();
            Cell::Text(format!("{{{}}}", entries.join(", ")))
        }
        Value::Union(inner) => to_cell(*inner),
        // Value is non-exhaustive; later engine releases add variants.
        other => {
            log::debug!("No dedicated rendering for result value {other:?}");
            Cell::Text(format!("{other:?}"))
        }
    }
}

fn collect_rows(stmt: &mut Statement<'_>) -> Result<QueryResult, duckdb::Error> {
    let mut rows = stmt.query([])?;
    let columns = rows
        .as_ref()
        .map(Statement::column_names)
        .unwrap_or_default();

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            cells.push(to_cell(row.get::<_, Value>(i)?));
        }
        out.push(cells);
    }

    Ok(QueryResult { columns, rows: out })
}

/// Runs one read-only SQL statement against the records, bound as
/// [`QUERY_TABLE`].
///
/// The database is created for this call only. After loading, external
/// file and network access is disabled and the configuration is locked, so
/// the statement can neither read outside the table nor undo the limits.
///
/// # Errors
///
/// * [`AnalyticsError::Query`] if the statement is rejected or fails
/// * [`AnalyticsError::Database`] if the table cannot be built
pub fn execute_query(
    records: &[NormalizedRecord],
    sql: &str,
) -> Result<QueryResult, AnalyticsError> {
    let statement = validate_query(sql)?;

    let table_columns = table_columns(records);
    if table_columns.is_empty() {
        return Err(AnalyticsError::Query {
            message: "No columns to query; fetch some records first".to_string(),
        });
    }

    let conn = Connection::open_in_memory()?;
    load_table(&conn, records, &table_columns)?;
    conn.execute_batch(
        "SET enable_external_access = false;
         SET lock_configuration = true;",
    )?;

    log::debug!(
        "Running query over {} rows x {} columns: {statement}",
        records.len(),
        table_columns.len()
    );

    let query_error = |e: duckdb::Error| AnalyticsError::Query {
        message: e.to_string(),
    };
    let mut stmt = conn.prepare(statement).map_err(query_error)?;
    let result = collect_rows(&mut stmt).map_err(query_error)?;

    log::info!("Query returned {} rows", result.len());
    Ok(result)
}

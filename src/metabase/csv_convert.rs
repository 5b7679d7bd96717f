//! CSV export to Polars DataFrame conversion
//!
//! Metabase exports results as CSV text. Columns get Polars' default type
//! inference, except the columns the server reported as date-typed, which are
//! parsed into `Datetime` values.

use super::error::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use std::io::Cursor;
use tracing::{debug, warn};

/// Layouts tried, in order, for date-time values
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    // Metabase's formatted exports: "January 1, 2024, 3:45 PM"
    "%B %d, %Y, %I:%M %p",
    "%B %d, %Y, %H:%M",
];

/// Layouts tried, in order, for plain dates
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%B %d, %Y", "%m/%d/%Y", "%Y/%m/%d"];

/// Month-bucketed layouts ("2024-01", "January, 2024"), read as the 1st
const MONTH_FORMATS: &[&str] = &["%Y-%m", "%B, %Y", "%B %Y"];

/// Parse CSV text into a DataFrame, converting `date_fields` to `Datetime`
///
/// Date fields inferred as integers (year buckets) are converted too. Date
/// fields missing from the header are skipped. A date column containing
/// a value none of the known layouts accept is left with its inferred type.
pub fn csv_to_dataframe(csv: &str, date_fields: &[String]) -> Result<DataFrame> {
    if csv.trim().is_empty() {
        return Ok(DataFrame::empty());
    }

    let cursor = Cursor::new(csv.as_bytes().to_vec());
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(cursor)
        .finish()?;

    for name in date_fields {
        let column = match df.column(name) {
            Ok(column) => column,
            Err(_) => {
                warn!("Date field '{}' not present in CSV header, skipping", name);
                continue;
            }
        };

        if column.dtype().is_temporal() {
            continue;
        }

        let as_text = column.cast(&DataType::String)?;
        match parse_datetime_series(as_text.as_materialized_series())? {
            Some(parsed) => {
                df.with_column(parsed)?;
            }
            None => warn!("Column '{}' has values that are not dates, leaving as-is", name),
        }
    }

    debug!("Parsed CSV into {} rows x {} columns", df.height(), df.width());
    Ok(df)
}

/// Parse every value of a string series; `None` if any non-empty value fails
fn parse_datetime_series(series: &Series) -> Result<Option<Series>> {
    let mut values: Vec<Option<NaiveDateTime>> = Vec::with_capacity(series.len());

    for value in series.str()?.into_iter() {
        match value.map(str::trim) {
            None | Some("") => values.push(None),
            Some(text) => match parse_datetime(text) {
                Some(parsed) => values.push(Some(parsed)),
                None => return Ok(None),
            },
        }
    }

    Ok(Some(Series::new(series.name().clone(), values)))
}

/// Parse one date or date-time value
///
/// Values with a UTC offset are normalized to UTC; naive values are kept as-is.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(text) {
        return Some(with_offset.naive_utc());
    }

    if let Some(parsed) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Some(parsed);
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| parse_period(text))
        .map(|date| date.and_time(NaiveTime::MIN))
}

/// First day of a month- or year-bucketed value
fn parse_period(text: &str) -> Option<NaiveDate> {
    if let Some(date) = MONTH_FORMATS.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(&format!("{} 1", text), &format!("{} %d", fmt)).ok()
    }) {
        return Some(date);
    }

    if text.len() == 4 && text.bytes().all(|b| b.is_ascii_digit()) {
        return NaiveDate::from_ymd_opt(text.parse().ok()?, 1, 1);
    }
    None
}

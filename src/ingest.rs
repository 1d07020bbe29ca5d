//! CSV readers for the two data inputs: an hourly `(Date, SSRD)` series and
//! a quasi-random sequence.

use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, warn};

use crate::error::{Result, RiskError};
use crate::types::IrradianceSample;

pub const DATE_COLUMN: &str = "Date";
pub const SSRD_COLUMN: &str = "SSRD";

/// Tried in this order; the first whose header holds both required columns
/// is used.
pub const DELIMITERS: [u8; 2] = [b'\t', b','];

const DATETIME_FORMATS: [&str; 9] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];

/// Parse a timestamp, preferring day-first for ambiguous slash dates.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

pub fn read_irradiance_csv(path: impl AsRef<Path>) -> Result<Vec<IrradianceSample>> {
    let text = fs::read_to_string(path.as_ref())?;
    debug!(path = %path.as_ref().display(), bytes = text.len(), "read irradiance file");
    parse_irradiance(&text)
}

/// Rows whose date does not parse are skipped; if none parse the input is
/// rejected. A non-numeric SSRD cell on a dated row is an error.
pub fn parse_irradiance(text: &str) -> Result<Vec<IrradianceSample>> {
    let (delimiter, date_idx, ssrd_idx) = detect_layout(text)?;

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut samples = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let Some(timestamp) = record.get(date_idx).and_then(parse_timestamp) else {
            skipped += 1;
            continue;
        };
        let raw = record.get(ssrd_idx).unwrap_or("");
        let irradiance: f64 = raw.parse().map_err(|_| RiskError::InvalidValue {
            line,
            detail: format!("SSRD '{raw}' is not a number"),
        })?;
        samples.push(IrradianceSample { timestamp, irradiance });
    }

    if samples.is_empty() {
        return Err(RiskError::NoValidDates);
    }
    if skipped > 0 {
        debug!(skipped, "rows with unparseable dates dropped");
    }
    debug!(rows = samples.len(), delimiter = %(delimiter as char).escape_default(), "irradiance parsed");
    Ok(samples)
}

fn detect_layout(text: &str) -> Result<(u8, usize, usize)> {
    let mut missing = DATE_COLUMN;
    for delimiter in DELIMITERS {
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(Trim::All)
            .from_reader(text.as_bytes());
        let headers = reader.headers()?.clone();
        match (column(&headers, DATE_COLUMN), column(&headers, SSRD_COLUMN)) {
            (Some(d), Some(s)) => return Ok((delimiter, d, s)),
            (Some(_), None) => missing = SSRD_COLUMN,
            _ => {}
        }
    }
    Err(RiskError::MissingColumn(missing.to_string()))
}

fn column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.eq_ignore_ascii_case(name))
}

pub fn read_quasi_random_csv(path: impl AsRef<Path>) -> Result<Vec<f64>> {
    let text = fs::read_to_string(path.as_ref())?;
    parse_quasi_random(&text)
}

/// Values from the first column after a header row. Blank cells are skipped;
/// range checks are left to `QuasiRandomSequence`.
pub fn parse_quasi_random(text: &str) -> Result<Vec<f64>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    if reader.headers()?.is_empty() {
        return Err(RiskError::MissingColumn("first column".to_string()));
    }

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cell = record.get(0).unwrap_or("");
        if cell.is_empty() {
            continue;
        }
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let v: f64 = cell.parse().map_err(|_| RiskError::InvalidValue {
            line,
            detail: format!("quasi-random value '{cell}' is not a number"),
        })?;
        values.push(v);
    }
    if values.is_empty() {
        warn!("quasi-random file holds no values");
    }
    Ok(values)
}

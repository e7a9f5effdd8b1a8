//! Output formatting and persistence for health index results.
//!
//! Supports pretty-printing, JSON serialization, and CSV append.

use anyhow::Result;
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::Path;
use tracing::{debug, info};

use crate::result::HealthIndexResult;
use crate::types::Pollutant;

/// Flat CSV shape of a [`HealthIndexResult`].
#[derive(Debug, Serialize)]
struct ResultRow<'a> {
    computed_at: DateTime<Utc>,
    station_id: &'a str,
    variant: String,
    value: Option<f64>,
    level: String,
    label: &'a str,
    calculation_method: String,
    quality: Option<String>,
    sample_count: usize,
    missing_pollutants: String,
    supplemented_pollutants: String,
    note: Option<&'a str>,
}

fn join_codes(pollutants: &[Pollutant]) -> String {
    pollutants.iter().map(Pollutant::code).collect::<Vec<_>>().join(";")
}

impl<'a> From<&'a HealthIndexResult> for ResultRow<'a> {
    fn from(r: &'a HealthIndexResult) -> Self {
        Self {
            computed_at: r.computed_at,
            station_id: &r.station_id,
            variant: r.variant.to_string(),
            value: r.value,
            level: r.level.to_string(),
            label: &r.label,
            calculation_method: r.calculation_method.to_string(),
            quality: r.quality.map(|q| q.to_string()),
            sample_count: r.sample_count,
            missing_pollutants: join_codes(&r.missing_pollutants),
            supplemented_pollutants: join_codes(&r.supplemented_pollutants),
            note: r.note.as_deref(),
        }
    }
}

/// Logs a result using Rust's debug pretty-print format.
pub fn print_pretty(result: &HealthIndexResult) {
    debug!("{:#?}", result);
}

/// Logs a result as pretty-printed JSON.
pub fn print_json(result: &HealthIndexResult) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

/// Appends a [`HealthIndexResult`] as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, result: &HealthIndexResult) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    writer.serialize(ResultRow::from(result))?;
    writer.flush()?;

    Ok(())
}

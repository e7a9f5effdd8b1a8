//! File-backed time-series store for station readings.
//!
//! Rows are long format, one pollutant per row, partitioned by station and
//! UTC day:
//!
//! ```text
//! <root>/station_id=<id>/date=<YYYY-MM-DD>.csv
//! ```
//!
//! Files are append-only. Retention belongs to whoever owns the directory.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::services::{CurrentReadings, ReadingHistory};
use crate::types::{Concentration, GeoPoint, Measurement, Pollutant, PollutantReading, Unit};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredRow {
    station_id: String,
    timestamp: DateTime<Utc>,
    lat: f64,
    lon: f64,
    pollutant: Pollutant,
    value: f64,
    unit: Unit,
}

#[derive(Debug, Clone)]
pub struct CsvReadingStore {
    root: PathBuf,
}

impl CsvReadingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn station_dir(&self, station_id: &str) -> Result<PathBuf> {
        let valid = !station_id.is_empty()
            && station_id != "."
            && station_id != ".."
            && !station_id.contains(['/', '\\']);
        if !valid {
            anyhow::bail!("station id '{station_id}' cannot be used as a partition name");
        }
        Ok(self.root.join(format!("station_id={station_id}")))
    }

    fn day_file(dir: &Path, date: NaiveDate) -> PathBuf {
        dir.join(format!("date={}.csv", date.format("%Y-%m-%d")))
    }

    /// Appends one reading. Silent readings write nothing. Returns the number
    /// of rows written.
    pub fn append(&self, reading: &PollutantReading) -> Result<usize> {
        if reading.is_silent() {
            return Ok(0);
        }
        let dir = self.station_dir(&reading.station_id)?;
        std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

        let path = Self::day_file(&dir, reading.timestamp.date_naive());
        let file_exists = path.exists();
        debug!(path = %path.display(), file_exists, "Appending reading rows");

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        let mut writer = WriterBuilder::new()
            .has_headers(!file_exists)
            .from_writer(file);

        for (pollutant, m) in &reading.values {
            writer.serialize(StoredRow {
                station_id: reading.station_id.clone(),
                timestamp: reading.timestamp,
                lat: reading.location.lat,
                lon: reading.location.lon,
                pollutant: *pollutant,
                value: m.quantity,
                unit: m.unit,
            })?;
        }
        writer.flush()?;
        Ok(reading.values.len())
    }

    pub fn append_all(&self, readings: &[PollutantReading]) -> Result<usize> {
        readings.iter().try_fold(0, |rows, r| Ok(rows + self.append(r)?))
    }

    fn read_file(path: &Path) -> Result<Vec<StoredRow>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
        let rows = reader
            .deserialize()
            .collect::<Result<Vec<StoredRow>, _>>()
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(rows)
    }

    /// Days with a partition file for `station_id`, newest first.
    fn days(&self, station_id: &str) -> Result<Vec<NaiveDate>> {
        let dir = self.station_dir(station_id)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut days: Vec<NaiveDate> = std::fs::read_dir(&dir)?
            .filter_map(|entry| {
                let name = entry.ok()?.file_name();
                let date = name.to_str()?.strip_prefix("date=")?.strip_suffix(".csv")?;
                NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
            })
            .collect();
        days.sort_unstable_by(|a, b| b.cmp(a));
        Ok(days)
    }

    /// Readings with `from <= timestamp <= to`, oldest first.
    pub fn load(&self, station_id: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<PollutantReading>> {
        let dir = self.station_dir(station_id)?;
        let (first, last) = (from.date_naive(), to.date_naive());

        let mut rows = Vec::new();
        for day in self.days(station_id)? {
            if day < first || day > last {
                continue;
            }
            rows.extend(Self::read_file(&Self::day_file(&dir, day))?);
        }
        rows.retain(|r| r.timestamp >= from && r.timestamp <= to);
        Ok(group_rows(rows))
    }

    /// Newest reading at or after `not_before`.
    pub fn latest_since(&self, station_id: &str, not_before: DateTime<Utc>) -> Result<Option<PollutantReading>> {
        let dir = self.station_dir(station_id)?;
        for day in self.days(station_id)? {
            if day < not_before.date_naive() {
                break;
            }
            let mut rows = Self::read_file(&Self::day_file(&dir, day))?;
            rows.retain(|r| r.timestamp >= not_before);
            if let Some(reading) = group_rows(rows).pop() {
                return Ok(Some(reading));
            }
        }
        Ok(None)
    }
}

/// Folds long-format rows back into one reading per timestamp.
fn group_rows(rows: Vec<StoredRow>) -> Vec<PollutantReading> {
    let mut readings: BTreeMap<DateTime<Utc>, PollutantReading> = BTreeMap::new();
    for row in rows {
        let reading = readings.entry(row.timestamp).or_insert_with(|| {
            PollutantReading::new(row.station_id.clone(), row.timestamp, GeoPoint::new(row.lat, row.lon))
        });
        reading.values.insert(
            row.pollutant,
            Measurement::primary(Concentration::new(row.value, row.unit)),
        );
    }
    readings.into_values().collect()
}

#[async_trait::async_trait]
impl ReadingHistory for CsvReadingStore {
    async fn readings(&self, station_id: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<PollutantReading>> {
        let store = self.clone();
        let station_id = station_id.to_string();
        tokio::task::spawn_blocking(move || store.load(&station_id, from, to)).await?
    }
}

#[async_trait::async_trait]
impl CurrentReadings for CsvReadingStore {
    async fn latest(&self, station_id: &str, not_before: DateTime<Utc>) -> Result<Option<PollutantReading>> {
        let store = self.clone();
        let station_id = station_id.to_string();
        tokio::task::spawn_blocking(move || store.latest_since(&station_id, not_before)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::env;
    use std::fs;

    fn temp_store(name: &str) -> CsvReadingStore {
        let root = env::temp_dir().join(format!("health_index_test_{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        CsvReadingStore::new(root)
    }

    fn reading(at: DateTime<Utc>, pm25: f64) -> PollutantReading {
        PollutantReading::new("bkk-01", at, GeoPoint::new(13.75, 100.5))
            .with_primary(Pollutant::Pm25, Concentration::new(pm25, Unit::MicrogramsPerCubicMeter))
            .with_primary(Pollutant::O3, Concentration::new(30.0, Unit::PartsPerBillion))
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 2, 1, 0, 0).unwrap()
    }

    #[test]
    fn test_append_partitions_by_station_and_day() {
        let store = temp_store("partitions");
        store.append(&reading(t0(), 20.0)).unwrap();
        store.append(&reading(t0() - Duration::hours(2), 25.0)).unwrap();

        let dir = store.root().join("station_id=bkk-01");
        assert!(dir.join("date=2025-03-02.csv").exists());
        assert!(dir.join("date=2025-03-01.csv").exists());

        fs::remove_dir_all(store.root()).unwrap();
    }

    #[test]
    fn test_header_written_once_per_file() {
        let store = temp_store("header");
        store.append(&reading(t0(), 20.0)).unwrap();
        store.append(&reading(t0() + Duration::minutes(10), 21.0)).unwrap();

        let content = fs::read_to_string(store.root().join("station_id=bkk-01/date=2025-03-02.csv")).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines.iter().filter(|l| l.starts_with("station_id")).count(), 1);

        fs::remove_dir_all(store.root()).unwrap();
    }

    #[test]
    fn test_load_spans_day_boundary_and_filters_range() {
        let store = temp_store("load");
        let readings: Vec<_> = (0..4).map(|i| reading(t0() - Duration::hours(i), 10.0 + i as f64)).collect();
        assert_eq!(store.append_all(&readings).unwrap(), 8);

        let loaded = store.load("bkk-01", t0() - Duration::hours(2), t0()).unwrap();

        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].timestamp, t0() - Duration::hours(2));
        assert_eq!(loaded[2], readings[0]);

        fs::remove_dir_all(store.root()).unwrap();
    }

    #[test]
    fn test_latest_respects_lookback() {
        let store = temp_store("latest");
        store.append(&reading(t0() - Duration::hours(30), 50.0)).unwrap();

        assert!(store.latest_since("bkk-01", t0() - Duration::hours(24)).unwrap().is_none());
        let old = store.latest_since("bkk-01", t0() - Duration::hours(48)).unwrap().unwrap();
        assert_eq!(old.values[&Pollutant::Pm25].quantity, 50.0);

        store.append(&reading(t0(), 12.0)).unwrap();
        let newest = store.latest_since("bkk-01", t0() - Duration::hours(48)).unwrap().unwrap();
        assert_eq!(newest.timestamp, t0());

        fs::remove_dir_all(store.root()).unwrap();
    }

    #[test]
    fn test_unknown_station_is_empty_and_bad_ids_are_rejected() {
        let store = temp_store("unknown");
        assert!(store.load("nowhere", t0() - Duration::hours(3), t0()).unwrap().is_empty());
        assert!(store.load("../etc", t0(), t0()).is_err());
    }

    #[tokio::test]
    async fn test_trait_queries_run_off_the_runtime() {
        let store = temp_store("traits");
        store.append(&reading(t0(), 20.0)).unwrap();

        let history = store.readings("bkk-01", t0() - Duration::hours(3), t0()).await.unwrap();
        assert_eq!(history.len(), 1);
        let latest = store.latest("bkk-01", t0() - Duration::hours(1)).await.unwrap();
        assert!(latest.is_some());

        fs::remove_dir_all(store.root()).unwrap();
    }
}

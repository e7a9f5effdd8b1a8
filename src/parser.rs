//! JSON parser for station reading feeds.
//!
//! A feed is a JSON array of records (a single object is accepted too):
//!
//! ```json
//! [{
//!   "stationId": "bkk-01",
//!   "lat": 13.75, "lon": 100.5,
//!   "timestamp": "2025-03-01T09:00:00Z",
//!   "pollutants": {
//!     "pm25": { "value": 152, "kind": "index" },
//!     "o3":   { "value": 65, "kind": "concentration", "unit": "ppb" },
//!     "t":    { "value": 31.5, "kind": "concentration" }
//!   }
//! }]
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::normalizer::{Normalizer, RawValue};
use crate::types::{GeoPoint, Measurement, PollutantReading, StationId, Unit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    #[default]
    Index,
    Concentration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedValue {
    pub value: f64,
    #[serde(default, alias = "isIndexOrConcentration")]
    pub kind: ValueKind,
    /// Unit symbol for concentrations. Omitted means the pollutant's native
    /// reporting unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedRecord {
    pub station_id: StationId,
    pub lat: f64,
    pub lon: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub pollutants: BTreeMap<String, FeedValue>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FeedDocument {
    Many(Vec<FeedRecord>),
    One(FeedRecord),
}

/// Decodes a JSON feed into its records.
///
/// # Errors
///
/// Returns an error if the bytes are not a record or an array of records.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedRecord>> {
    let document: FeedDocument = serde_json::from_slice(bytes).context("decoding reading feed")?;
    Ok(match document {
        FeedDocument::Many(records) => records,
        FeedDocument::One(record) => vec![record],
    })
}

/// Turns a feed record into a reading in canonical units. Index values go
/// through the breakpoint tables; weather fields, unknown codes, unknown
/// units and invalid values are dropped.
pub fn normalize_record(normalizer: &Normalizer, record: &FeedRecord) -> PollutantReading {
    let mut reading = PollutantReading::new(
        record.station_id.clone(),
        record.timestamp,
        GeoPoint::new(record.lat, record.lon),
    );

    for (code, field) in &record.pollutants {
        let raw = match field.kind {
            ValueKind::Index => RawValue::Index(field.value),
            ValueKind::Concentration => {
                let unit = match field.unit.as_deref() {
                    None => None,
                    Some(symbol) => match Unit::from_symbol(symbol) {
                        Some(unit) => Some(unit),
                        None => {
                            debug!(station_id = %record.station_id, code = %code, symbol, "Unknown unit, field dropped");
                            continue;
                        }
                    },
                };
                RawValue::Concentration {
                    value: field.value,
                    unit,
                }
            }
        };

        match normalizer.normalize_field(code, raw) {
            Some((pollutant, c)) => {
                reading.values.insert(pollutant, Measurement::primary(c));
            }
            None => debug!(station_id = %record.station_id, code = %code, value = field.value, "Field skipped"),
        }
    }
    reading
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Pollutant;

    const FEED: &str = r#"[
        {
            "stationId": "bkk-01", "lat": 13.75, "lon": 100.5,
            "timestamp": "2025-03-01T09:00:00Z",
            "pollutants": {
                "pm25": { "value": 50, "kind": "index" },
                "o3": { "value": 65, "kind": "concentration", "unit": "ppb" },
                "no2": { "value": -3, "kind": "concentration" },
                "co": { "value": 2.0, "isIndexOrConcentration": "concentration" },
                "h": { "value": 71, "kind": "concentration" },
                "nh3": { "value": 4, "kind": "concentration" }
            }
        },
        { "stationId": "cnx-02", "lat": 18.79, "lon": 98.98, "timestamp": "2025-03-01T09:00:00Z" }
    ]"#;

    #[test]
    fn test_parse_empty_array() {
        assert!(parse_feed(b"[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_invalid_bytes() {
        assert!(parse_feed(&[0xFF, 0xFE, 0x00, 0x01]).is_err());
        assert!(parse_feed(br#"{"lat": 1}"#).is_err());
    }

    #[test]
    fn test_parse_single_record() {
        let records = parse_feed(
            br#"{"stationId":"a","lat":1.0,"lon":2.0,"timestamp":"2025-03-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].pollutants.is_empty());
    }

    #[test]
    fn test_normalize_record() {
        let records = parse_feed(FEED.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);

        let reading = normalize_record(&Normalizer::new(), &records[0]);

        assert_eq!(reading.station_id, "bkk-01");
        assert_eq!(
            reading.values.keys().copied().collect::<Vec<_>>(),
            vec![Pollutant::Pm25, Pollutant::O3, Pollutant::Co]
        );
        assert_eq!(reading.values[&Pollutant::Pm25].quantity, 9.0);
        assert!((reading.values[&Pollutant::O3].quantity - 127.4).abs() < 1e-9);
        assert_eq!(reading.values[&Pollutant::Co].unit, Unit::MilligramsPerCubicMeter);
        assert!((reading.values[&Pollutant::Co].quantity - 2.29).abs() < 1e-9);
    }

    #[test]
    fn test_record_without_pollutants_is_silent() {
        let records = parse_feed(FEED.as_bytes()).unwrap();
        let reading = normalize_record(&Normalizer::new(), &records[1]);
        assert!(reading.is_silent());
    }
}

//! Core data types shared by every stage of the health index pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a monitoring station as reported by the primary feed.
pub type StationId = String;

/// Air pollutants understood by the engine.
///
/// Meteorological fields reported next to pollutants (humidity, temperature,
/// pressure, wind) are deliberately not represented here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pollutant {
    #[serde(rename = "pm25")]
    Pm25,
    #[serde(rename = "pm10")]
    Pm10,
    #[serde(rename = "o3")]
    O3,
    #[serde(rename = "no2")]
    No2,
    #[serde(rename = "so2")]
    So2,
    #[serde(rename = "co")]
    Co,
}

/// Feed codes that describe weather rather than air quality.
const METEOROLOGICAL_CODES: &[&str] = &[
    "t",
    "h",
    "p",
    "w",
    "wg",
    "dew",
    "temperature",
    "humidity",
    "pressure",
    "wind",
];

impl Pollutant {
    pub const ALL: [Pollutant; 6] = [
        Pollutant::Pm25,
        Pollutant::Pm10,
        Pollutant::O3,
        Pollutant::No2,
        Pollutant::So2,
        Pollutant::Co,
    ];

    /// Parses a feed code. Returns `None` for meteorological and unknown codes.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "pm25" | "pm2_5" | "pm2.5" => Some(Pollutant::Pm25),
            "pm10" => Some(Pollutant::Pm10),
            "o3" => Some(Pollutant::O3),
            "no2" => Some(Pollutant::No2),
            "so2" => Some(Pollutant::So2),
            "co" => Some(Pollutant::Co),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Pollutant::Pm25 => "pm25",
            Pollutant::Pm10 => "pm10",
            Pollutant::O3 => "o3",
            Pollutant::No2 => "no2",
            Pollutant::So2 => "so2",
            Pollutant::Co => "co",
        }
    }

    /// Returns `true` if the code names a weather field that must never be
    /// converted as a pollutant.
    pub fn is_meteorological(code: &str) -> bool {
        let code = code.trim().to_ascii_lowercase();
        METEOROLOGICAL_CODES.contains(&code.as_str())
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Physical units a concentration can be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "ug/m3")]
    MicrogramsPerCubicMeter,
    #[serde(rename = "mg/m3")]
    MilligramsPerCubicMeter,
    #[serde(rename = "ppb")]
    PartsPerBillion,
    #[serde(rename = "ppm")]
    PartsPerMillion,
}

impl Unit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::MicrogramsPerCubicMeter => "ug/m3",
            Unit::MilligramsPerCubicMeter => "mg/m3",
            Unit::PartsPerBillion => "ppb",
            Unit::PartsPerMillion => "ppm",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol.trim().to_ascii_lowercase().as_str() {
            "ug/m3" | "µg/m³" | "µg/m3" | "ugm3" => Some(Unit::MicrogramsPerCubicMeter),
            "mg/m3" | "mg/m³" | "mgm3" => Some(Unit::MilligramsPerCubicMeter),
            "ppb" => Some(Unit::PartsPerBillion),
            "ppm" => Some(Unit::PartsPerMillion),
            _ => None,
        }
    }

    /// Mass-per-volume units as opposed to molar-volume (mixing ratio) units.
    pub fn is_mass(&self) -> bool {
        matches!(
            self,
            Unit::MicrogramsPerCubicMeter | Unit::MilligramsPerCubicMeter
        )
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A physical pollutant quantity in a known unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Concentration {
    pub value: f64,
    pub unit: Unit,
}

impl Concentration {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }
}

/// Concentrations keyed by pollutant. An absent key means "not measured".
pub type Concentrations = BTreeMap<Pollutant, Concentration>;

/// Where a measurement came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    Primary,
    Supplement,
}

/// One pollutant measurement inside a reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub quantity: f64,
    pub unit: Unit,
    pub source: SourceTag,
}

impl Measurement {
    pub fn primary(concentration: Concentration) -> Self {
        Self {
            quantity: concentration.value,
            unit: concentration.unit,
            source: SourceTag::Primary,
        }
    }

    pub fn supplement(concentration: Concentration) -> Self {
        Self {
            quantity: concentration.value,
            unit: concentration.unit,
            source: SourceTag::Supplement,
        }
    }

    pub fn concentration(&self) -> Concentration {
        Concentration::new(self.quantity, self.unit)
    }
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Planar distance on raw (lat, lon) degrees.
    pub fn planar_distance(&self, other: &GeoPoint) -> f64 {
        ((self.lat - other.lat).powi(2) + (self.lon - other.lon).powi(2)).sqrt()
    }
}

/// A station's measurements at one point in time.
///
/// Quantities are non-negative. A reading with no measurements is valid and
/// means the station was silent at that poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollutantReading {
    pub station_id: StationId,
    pub timestamp: DateTime<Utc>,
    pub location: GeoPoint,
    pub values: BTreeMap<Pollutant, Measurement>,
}

impl PollutantReading {
    pub fn new(station_id: impl Into<StationId>, timestamp: DateTime<Utc>, location: GeoPoint) -> Self {
        Self {
            station_id: station_id.into(),
            timestamp,
            location,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style insert of a primary measurement. Negative or non-finite
    /// quantities are dropped.
    pub fn with_primary(mut self, pollutant: Pollutant, concentration: Concentration) -> Self {
        if concentration.value.is_finite() && concentration.value >= 0.0 {
            self.values
                .insert(pollutant, Measurement::primary(concentration));
        }
        self
    }

    pub fn is_silent(&self) -> bool {
        self.values.is_empty()
    }

    pub fn concentrations(&self) -> Concentrations {
        self.values
            .iter()
            .map(|(p, m)| (*p, m.concentration()))
            .collect()
    }

    pub fn pollutants_from(&self, source: SourceTag) -> Vec<Pollutant> {
        self.values
            .iter()
            .filter(|(_, m)| m.source == source)
            .map(|(p, _)| *p)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pollutant_codes() {
        assert_eq!(Pollutant::from_code("PM2.5"), Some(Pollutant::Pm25));
        assert_eq!(Pollutant::from_code("pm2_5"), Some(Pollutant::Pm25));
        assert_eq!(Pollutant::from_code(" no2 "), Some(Pollutant::No2));
        assert_eq!(Pollutant::from_code("nh3"), None);
        for p in Pollutant::ALL {
            assert_eq!(Pollutant::from_code(p.code()), Some(p));
        }
    }

    #[test]
    fn test_meteorological_codes_are_not_pollutants() {
        for code in ["t", "h", "p", "w", "wg", "dew", "Humidity"] {
            assert!(Pollutant::is_meteorological(code));
            assert_eq!(Pollutant::from_code(code), None);
        }
        assert!(!Pollutant::is_meteorological("o3"));
    }

    #[test]
    fn test_with_primary_drops_negative_values() {
        let reading = PollutantReading::new("s1", Utc::now(), GeoPoint::new(13.7, 100.5))
            .with_primary(Pollutant::Pm25, Concentration::new(-1.0, Unit::MicrogramsPerCubicMeter))
            .with_primary(Pollutant::O3, Concentration::new(0.0, Unit::MicrogramsPerCubicMeter));

        assert!(!reading.values.contains_key(&Pollutant::Pm25));
        assert_eq!(reading.values[&Pollutant::O3].quantity, 0.0);
        assert_eq!(reading.pollutants_from(SourceTag::Primary), vec![Pollutant::O3]);
    }

    #[test]
    fn test_silent_reading() {
        let reading = PollutantReading::new("s1", Utc::now(), GeoPoint::new(0.0, 0.0));
        assert!(reading.is_silent());
        assert!(reading.concentrations().is_empty());
    }

    #[test]
    fn test_unit_symbols_round_trip() {
        for unit in [
            Unit::MicrogramsPerCubicMeter,
            Unit::MilligramsPerCubicMeter,
            Unit::PartsPerBillion,
            Unit::PartsPerMillion,
        ] {
            assert_eq!(Unit::from_symbol(unit.symbol()), Some(unit));
        }
    }
}

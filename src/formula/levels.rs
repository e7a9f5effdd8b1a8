//! Risk level classification of a rounded health index.
//!
//! | Level     | Default range |
//! |-----------|---------------|
//! | Low       | < 4           |
//! | Moderate  | 4 – 6.x       |
//! | High      | 7 – 10.x      |
//! | VeryHigh  | >= 11         |

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthLevel {
    Low,
    Moderate,
    High,
    VeryHigh,
    /// Nothing could be computed for the station.
    NoData,
}

impl fmt::Display for HealthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthLevel::Low => "low",
            HealthLevel::Moderate => "moderate",
            HealthLevel::High => "high",
            HealthLevel::VeryHigh => "very_high",
            HealthLevel::NoData => "no_data",
        };
        f.write_str(s)
    }
}

/// One tier of a level table. The tier applies from `from` (inclusive) up to
/// the next tier's `from`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelBand {
    pub level: HealthLevel,
    pub from: f64,
    pub label: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelTable {
    pub bands: Vec<LevelBand>,
}

const TIER_ORDER: [HealthLevel; 4] = [
    HealthLevel::Low,
    HealthLevel::Moderate,
    HealthLevel::High,
    HealthLevel::VeryHigh,
];

impl LevelTable {
    /// Builds the four-tier table from the lower bounds of the upper three tiers.
    pub fn with_thresholds(moderate: f64, high: f64, very_high: f64) -> Self {
        let band = |level, from: f64, label: &str, description: &str| LevelBand {
            level,
            from,
            label: label.to_string(),
            description: description.to_string(),
        };
        Self {
            bands: vec![
                band(
                    HealthLevel::Low,
                    0.0,
                    "Low risk",
                    "Ideal air quality for outdoor activities.",
                ),
                band(
                    HealthLevel::Moderate,
                    moderate,
                    "Moderate risk",
                    "Sensitive groups should consider reducing strenuous outdoor activity.",
                ),
                band(
                    HealthLevel::High,
                    high,
                    "High risk",
                    "Reduce or reschedule strenuous outdoor activity; sensitive groups should stay indoors.",
                ),
                band(
                    HealthLevel::VeryHigh,
                    very_high,
                    "Very high risk",
                    "Avoid strenuous outdoor activity.",
                ),
            ],
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.bands.len() != TIER_ORDER.len() {
            return Err(format!(
                "level table needs {} tiers, found {}",
                TIER_ORDER.len(),
                self.bands.len()
            ));
        }
        for (band, expected) in self.bands.iter().zip(TIER_ORDER) {
            if band.level != expected {
                return Err(format!("expected tier {expected}, found {}", band.level));
            }
        }
        for pair in self.bands.windows(2) {
            if pair[1].from.is_nan() || pair[1].from <= pair[0].from {
                return Err(format!(
                    "tier {} must start above tier {}",
                    pair[1].level, pair[0].level
                ));
            }
        }
        Ok(())
    }

    /// Returns the band a rounded index value belongs to.
    pub fn classify(&self, value: f64) -> &LevelBand {
        self.bands
            .iter()
            .rev()
            .find(|band| value >= band.from)
            .unwrap_or(&self.bands[0])
    }
}

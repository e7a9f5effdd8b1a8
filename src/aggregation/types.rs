//! Data types produced by the aggregation stage.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::aggregation::quality::QualityTier;
use crate::normalizer::canonical_unit;
use crate::types::{Concentration, Concentrations, GeoPoint, Measurement, Pollutant, PollutantReading, StationId};

/// Windowed per-pollutant means for one station. Recomputed per request,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateWindow {
    pub station_id: StationId,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Means in each pollutant's canonical unit.
    pub means: BTreeMap<Pollutant, f64>,
    /// Valid samples behind each mean.
    pub pollutant_samples: BTreeMap<Pollutant, usize>,
    /// Readings that contributed at least one valid value.
    pub sample_count: usize,
    /// Fraction of the window spanned by the contributing readings.
    pub coverage: f64,
    pub quality_tier: QualityTier,
    /// Location reported by the newest contributing reading.
    pub location: GeoPoint,
}

impl AggregateWindow {
    pub fn concentrations(&self) -> Concentrations {
        self.means
            .iter()
            .map(|(p, v)| (*p, Concentration::new(*v, canonical_unit(*p))))
            .collect()
    }

    /// Re-expresses the window as a primary-source reading stamped at the
    /// window end, ready for source fusion.
    pub fn to_reading(&self) -> PollutantReading {
        PollutantReading {
            station_id: self.station_id.clone(),
            timestamp: self.window_end,
            location: self.location,
            values: self
                .concentrations()
                .into_iter()
                .map(|(p, c)| (p, Measurement::primary(c)))
                .collect(),
        }
    }
}

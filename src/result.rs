//! The health index result handed to the presentation layer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::aggregation::QualityTier;
use crate::formula::{Evaluation, HealthLevel, VariantId};
use crate::types::{Pollutant, StationId};

/// Which step of the fallback chain produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationMethod {
    Aggregate,
    Current,
    None,
}

impl fmt::Display for CalculationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CalculationMethod::Aggregate => "aggregate",
            CalculationMethod::Current => "current",
            CalculationMethod::None => "none",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthIndexResult {
    pub station_id: StationId,
    pub variant: VariantId,
    /// `None` is the no-data sentinel; it always comes with
    /// [`HealthLevel::NoData`] and a note.
    pub value: Option<f64>,
    pub risk_components: BTreeMap<Pollutant, f64>,
    pub level: HealthLevel,
    pub label: String,
    pub calculation_method: CalculationMethod,
    pub quality: Option<QualityTier>,
    pub sample_count: usize,
    pub missing_pollutants: Vec<Pollutant>,
    pub supplemented_pollutants: Vec<Pollutant>,
    pub note: Option<String>,
    pub computed_at: DateTime<Utc>,
}

impl HealthIndexResult {
    pub fn computed(
        station_id: &str,
        evaluation: Evaluation,
        method: CalculationMethod,
        quality: QualityTier,
        sample_count: usize,
        supplemented_pollutants: Vec<Pollutant>,
        computed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            station_id: station_id.to_string(),
            variant: evaluation.variant,
            value: Some(evaluation.value),
            risk_components: evaluation.risk_components,
            level: evaluation.level,
            label: evaluation.label,
            calculation_method: method,
            quality: Some(quality),
            sample_count,
            missing_pollutants: evaluation.missing,
            supplemented_pollutants,
            note: None,
            computed_at,
        }
    }

    pub fn no_data(station_id: &str, variant: VariantId, note: impl Into<String>, computed_at: DateTime<Utc>) -> Self {
        Self {
            station_id: station_id.to_string(),
            variant,
            value: None,
            risk_components: BTreeMap::new(),
            level: HealthLevel::NoData,
            label: "No data".to_string(),
            calculation_method: CalculationMethod::None,
            quality: None,
            sample_count: 0,
            missing_pollutants: Vec::new(),
            supplemented_pollutants: Vec::new(),
            note: Some(note.into()),
            computed_at,
        }
    }

    pub fn is_no_data(&self) -> bool {
        self.value.is_none()
    }
}

//! Regional formula variants and their coefficient tables.
//!
//! A variant evaluates
//!
//! ```text
//! index = (10 / C) * sum_scale * Σ term_scale_i * (exp(beta_i * c_i) - 1)
//! ```
//!
//! The ×100 factor lives either in every `term_scale` (applied before
//! summation) or in `sum_scale` (applied after). Each variant states its
//! own placement.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::HealthIndexError;
use crate::formula::levels::LevelTable;
use crate::normalizer::units;
use crate::types::{Pollutant, Unit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariantId {
    Thai,
    Canadian,
    Pm25Only,
}

impl VariantId {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantId::Thai => "thai",
            VariantId::Canadian => "canadian",
            VariantId::Pm25Only => "pm25-only",
        }
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariantId {
    type Err = HealthIndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "thai" | "th" => Ok(VariantId::Thai),
            "canadian" | "ca" => Ok(VariantId::Canadian),
            "pm25-only" | "pm25" => Ok(VariantId::Pm25Only),
            other => Err(HealthIndexError::config(format!("unknown variant '{other}'"))),
        }
    }
}

/// One pollutant's contribution to a variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaTerm {
    pub pollutant: Pollutant,
    pub beta: f64,
    /// Unit the concentration must be supplied in.
    pub unit: Unit,
    #[serde(default = "unit_scale")]
    pub term_scale: f64,
}

fn unit_scale() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSpec {
    pub id: VariantId,
    pub scaling_constant: f64,
    pub terms: Vec<FormulaTerm>,
    #[serde(default = "unit_scale")]
    pub sum_scale: f64,
    /// Lowest reportable value.
    pub floor: f64,
    /// Decimal places kept after rounding.
    pub precision: u32,
    pub levels: LevelTable,
}

/// Most decimal places a variant may report.
pub const MAX_PRECISION: u32 = 6;

impl VariantSpec {
    pub fn required_pollutants(&self) -> impl Iterator<Item = Pollutant> + '_ {
        self.terms.iter().map(|t| t.pollutant)
    }

    pub fn validate(&self) -> Result<(), HealthIndexError> {
        let fail = |msg: String| -> Result<(), HealthIndexError> {
            Err(HealthIndexError::config(format!("variant {}: {msg}", self.id)))
        };

        if !(self.scaling_constant.is_finite() && self.scaling_constant > 0.0) {
            return fail(format!("scaling constant {} must be positive", self.scaling_constant));
        }
        if !(self.sum_scale.is_finite() && self.sum_scale > 0.0) {
            return fail(format!("sum scale {} must be positive", self.sum_scale));
        }
        if !self.floor.is_finite() {
            return fail("floor must be finite".into());
        }
        if self.precision > MAX_PRECISION {
            return fail(format!("precision {} exceeds {MAX_PRECISION} decimals", self.precision));
        }
        if self.terms.is_empty() {
            return fail("no formula terms".into());
        }
        for (i, term) in self.terms.iter().enumerate() {
            if !term.beta.is_finite() || term.beta < 0.0 {
                return fail(format!("beta {} for {} is invalid", term.beta, term.pollutant));
            }
            if !(term.term_scale.is_finite() && term.term_scale > 0.0) {
                return fail(format!("term scale for {} must be positive", term.pollutant));
            }
            if !units::is_convertible(term.pollutant, term.unit) {
                return fail(format!("{} cannot be expressed in {}", term.pollutant, term.unit));
            }
            if self.terms[..i].iter().any(|t| t.pollutant == term.pollutant) {
                return fail(format!("{} listed twice", term.pollutant));
            }
        }
        self.levels.validate().or_else(fail)
    }
}

fn term(pollutant: Pollutant, beta: f64, unit: Unit, term_scale: f64) -> FormulaTerm {
    FormulaTerm {
        pollutant,
        beta,
        unit,
        term_scale,
    }
}

/// Thai standard: all pollutants in µg/m³, ×100 on every term.
pub fn thai() -> VariantSpec {
    VariantSpec {
        id: VariantId::Thai,
        scaling_constant: 105.19,
        terms: vec![
            term(Pollutant::Pm25, 0.0012, Unit::MicrogramsPerCubicMeter, 100.0),
            term(Pollutant::O3, 0.0010, Unit::MicrogramsPerCubicMeter, 100.0),
            term(Pollutant::No2, 0.0052, Unit::MicrogramsPerCubicMeter, 100.0),
        ],
        sum_scale: 1.0,
        floor: 0.0,
        precision: 0,
        levels: LevelTable::with_thresholds(4.0, 7.0, 11.0),
    }
}

/// Canadian standard: gases in ppb, ×100 applied once to the sum. The scale
/// starts at 1.
pub fn canadian() -> VariantSpec {
    VariantSpec {
        id: VariantId::Canadian,
        scaling_constant: 10.4,
        terms: vec![
            term(Pollutant::O3, 0.000537, Unit::PartsPerBillion, 1.0),
            term(Pollutant::No2, 0.000871, Unit::PartsPerBillion, 1.0),
            term(Pollutant::Pm25, 0.000487, Unit::MicrogramsPerCubicMeter, 1.0),
        ],
        sum_scale: 100.0,
        floor: 1.0,
        precision: 0,
        levels: LevelTable::with_thresholds(4.0, 7.0, 11.0),
    }
}

/// Diagnostic single-pollutant variant, reported to one decimal.
pub fn pm25_only() -> VariantSpec {
    VariantSpec {
        id: VariantId::Pm25Only,
        scaling_constant: 6.4,
        terms: vec![term(
            Pollutant::Pm25,
            0.0012,
            Unit::MicrogramsPerCubicMeter,
            100.0,
        )],
        sum_scale: 1.0,
        floor: 0.0,
        precision: 1,
        levels: LevelTable::with_thresholds(4.0, 7.0, 11.0),
    }
}

pub fn builtin() -> Vec<VariantSpec> {
    vec![thai(), canadian(), pm25_only()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_variants_validate() {
        for spec in builtin() {
            assert!(spec.validate().is_ok(), "{} failed validation", spec.id);
        }
    }

    #[test]
    fn test_variant_parsing() {
        assert_eq!("thai".parse::<VariantId>().unwrap(), VariantId::Thai);
        assert_eq!("Canadian".parse::<VariantId>().unwrap(), VariantId::Canadian);
        assert_eq!("pm25-only".parse::<VariantId>().unwrap(), VariantId::Pm25Only);
        let err = "us-epa".parse::<VariantId>().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_scale_placement_differs_per_variant() {
        let thai = thai();
        assert_eq!(thai.sum_scale, 1.0);
        assert!(thai.terms.iter().all(|t| t.term_scale == 100.0));

        let canadian = canadian();
        assert_eq!(canadian.sum_scale, 100.0);
        assert!(canadian.terms.iter().all(|t| t.term_scale == 1.0));
    }

    #[test]
    fn test_validate_rejects_bad_tables() {
        let mut spec = thai();
        spec.scaling_constant = 0.0;
        assert!(spec.validate().is_err());

        let mut spec = canadian();
        spec.terms[0].beta = f64::NAN;
        assert!(spec.validate().is_err());

        let mut spec = pm25_only();
        spec.terms[0].unit = Unit::PartsPerBillion;
        assert!(spec.validate().is_err());

        let mut spec = thai();
        spec.terms.push(spec.terms[0].clone());
        assert!(spec.validate().is_err());

        let mut spec = thai();
        spec.terms.clear();
        assert!(spec.validate().is_err());

        let mut spec = pm25_only();
        spec.precision = 400;
        assert!(spec.validate().is_err());
        spec.precision = MAX_PRECISION;
        assert!(spec.validate().is_ok());
    }
}

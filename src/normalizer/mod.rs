//! Conversion between regional index values and physical concentrations.
//!
//! Index values go through the per-pollutant breakpoint tables in
//! [`breakpoints`] and land in the canonical unit from [`units`]. Formula
//! variants that need a different unit ask for it through
//! [`Normalizer::to_formula_unit`].

pub mod breakpoints;
pub mod units;

use tracing::debug;

use crate::types::{Concentration, Pollutant, Unit};

pub use units::canonical_unit;

/// How a raw feed value should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue {
    /// Regional index value (0–500).
    Index(f64),
    /// Physical concentration. Without a unit the pollutant's native
    /// reporting unit is assumed.
    Concentration { value: f64, unit: Option<Unit> },
}

#[derive(Debug, Clone, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Converts an index value into a canonical concentration.
    ///
    /// Returns `None` for negative, non-finite, or out-of-table values.
    pub fn to_concentration(&self, index: f64, pollutant: Pollutant) -> Option<Concentration> {
        let native = breakpoints::interpolate(breakpoints::table(pollutant), index);
        let Some(native) = native else {
            debug!(%pollutant, index, "Index outside breakpoint table");
            return None;
        };
        units::convert_concentration(
            Concentration::new(native, breakpoints::native_unit(pollutant)),
            canonical_unit(pollutant),
            pollutant,
        )
    }

    /// Re-expresses a concentration in the unit a formula variant requires.
    ///
    /// Unit pairs that cannot be converted for this pollutant are returned
    /// unchanged; variant tables are validated against that at construction.
    pub fn to_formula_unit(
        &self,
        concentration: Concentration,
        pollutant: Pollutant,
        target: Unit,
    ) -> Concentration {
        units::convert_concentration(concentration, target, pollutant).unwrap_or_else(|| {
            debug!(%pollutant, from = %concentration.unit, to = %target, "Unit not convertible");
            concentration
        })
    }

    /// Brings a raw concentration into the canonical unit.
    pub fn to_canonical(&self, value: f64, unit: Unit, pollutant: Pollutant) -> Option<Concentration> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        units::convert_concentration(Concentration::new(value, unit), canonical_unit(pollutant), pollutant)
    }

    /// Resolves one feed field. Meteorological and unknown codes yield `None`.
    pub fn normalize_field(&self, code: &str, raw: RawValue) -> Option<(Pollutant, Concentration)> {
        if Pollutant::is_meteorological(code) {
            return None;
        }
        let pollutant = Pollutant::from_code(code)?;
        let concentration = match raw {
            RawValue::Index(index) => self.to_concentration(index, pollutant),
            RawValue::Concentration { value, unit } => {
                let unit = unit.unwrap_or_else(|| breakpoints::native_unit(pollutant));
                self.to_canonical(value, unit, pollutant)
            }
        }?;
        Some((pollutant, concentration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pm25_good_upper_boundary() {
        let n = Normalizer::new();
        let c = n.to_concentration(50.0, Pollutant::Pm25).unwrap();
        assert_eq!(c, Concentration::new(9.0, Unit::MicrogramsPerCubicMeter));
    }

    #[test]
    fn test_particulate_boundaries_are_exact() {
        let n = Normalizer::new();
        for p in [Pollutant::Pm25, Pollutant::Pm10] {
            for bracket in breakpoints::table(p) {
                assert_eq!(n.to_concentration(bracket.idx_hi, p).unwrap().value, bracket.conc_hi);
                assert_eq!(n.to_concentration(bracket.idx_lo, p).unwrap().value, bracket.conc_lo);
            }
        }
    }

    #[test]
    fn test_gas_boundaries_survive_round_trip_to_native_unit() {
        let n = Normalizer::new();
        for p in [Pollutant::O3, Pollutant::No2, Pollutant::So2, Pollutant::Co] {
            let native = breakpoints::native_unit(p);
            for bracket in breakpoints::table(p) {
                for (idx, expected) in [(bracket.idx_hi, bracket.conc_hi), (bracket.idx_lo, bracket.conc_lo)] {
                    let canonical = n.to_concentration(idx, p).unwrap();
                    let back = n.to_formula_unit(canonical, p, native);
                    assert_eq!(back.unit, native);
                    assert!(
                        (back.value - expected).abs() < 1e-9,
                        "{p} index {idx}: {} != {expected}",
                        back.value
                    );
                }
            }
        }
    }

    #[test]
    fn test_gas_index_lands_in_mass_units() {
        let n = Normalizer::new();
        let o3 = n.to_concentration(50.0, Pollutant::O3).unwrap();
        assert_eq!(o3.unit, Unit::MicrogramsPerCubicMeter);
        assert!((o3.value - 54.0 * 1.96).abs() < 1e-9);

        let co = n.to_concentration(50.0, Pollutant::Co).unwrap();
        assert_eq!(co.unit, Unit::MilligramsPerCubicMeter);
        assert!((co.value - 4.4 * 1.145).abs() < 1e-9);
    }

    #[test]
    fn test_zero_index_is_measured_zero_not_missing() {
        let n = Normalizer::new();
        assert_eq!(n.to_concentration(0.0, Pollutant::Pm25).map(|c| c.value), Some(0.0));
        assert_eq!(n.to_concentration(501.0, Pollutant::Pm25), None);
        assert_eq!(n.to_concentration(-3.0, Pollutant::Pm25), None);
    }

    #[test]
    fn test_formula_unit_round_trip() {
        let n = Normalizer::new();
        let canonical = n
            .to_canonical(45.0, Unit::PartsPerBillion, Pollutant::No2)
            .unwrap();
        let ppb = n.to_formula_unit(canonical, Pollutant::No2, Unit::PartsPerBillion);
        assert_eq!(ppb.unit, Unit::PartsPerBillion);
        assert!((ppb.value - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_unconvertible_target_is_returned_unchanged() {
        let n = Normalizer::new();
        let pm = Concentration::new(12.0, Unit::MicrogramsPerCubicMeter);
        assert_eq!(n.to_formula_unit(pm, Pollutant::Pm25, Unit::PartsPerBillion), pm);
    }

    #[test]
    fn test_meteorological_fields_are_skipped() {
        let n = Normalizer::new();
        assert_eq!(n.normalize_field("h", RawValue::Index(40.0)), None);
        assert_eq!(n.normalize_field("t", RawValue::Concentration { value: 31.0, unit: None }), None);
        let (p, c) = n
            .normalize_field("no2", RawValue::Concentration { value: 10.0, unit: None })
            .unwrap();
        assert_eq!(p, Pollutant::No2);
        assert!((c.value - 18.8).abs() < 1e-9);
    }

    #[test]
    fn test_negative_concentration_is_dropped() {
        let n = Normalizer::new();
        assert_eq!(
            n.normalize_field("pm10", RawValue::Concentration { value: -5.0, unit: None }),
            None
        );
    }
}

//! Unit conversion between mass-per-volume and molar-volume units.

use crate::types::{Concentration, Pollutant, Unit};

/// µg/m³ per ppb at 25 °C and 1 atm. `None` for particulates, which have no
/// molar form.
pub fn molar_factor(pollutant: Pollutant) -> Option<f64> {
    match pollutant {
        Pollutant::O3 => Some(1.96),
        Pollutant::No2 => Some(1.88),
        Pollutant::So2 => Some(2.62),
        Pollutant::Co => Some(1.145),
        Pollutant::Pm25 | Pollutant::Pm10 => None,
    }
}

/// Unit every pollutant is carried in between pipeline stages.
pub fn canonical_unit(pollutant: Pollutant) -> Unit {
    match pollutant {
        Pollutant::Co => Unit::MilligramsPerCubicMeter,
        _ => Unit::MicrogramsPerCubicMeter,
    }
}

// Scale of each unit relative to µg/m³ (mass) or ppb (molar).
fn scale(unit: Unit) -> f64 {
    match unit {
        Unit::MicrogramsPerCubicMeter | Unit::PartsPerBillion => 1.0,
        Unit::MilligramsPerCubicMeter | Unit::PartsPerMillion => 1000.0,
    }
}

/// Whether `pollutant` can be expressed in `unit`.
pub fn is_convertible(pollutant: Pollutant, unit: Unit) -> bool {
    unit.is_mass() || molar_factor(pollutant).is_some()
}

/// Converts `value` from `from` to `to` for `pollutant`.
///
/// Mass to molar divides by exactly the factor that molar to mass multiplies
/// by. Returns `None` when one side is molar and the pollutant has no molar
/// form.
pub fn convert(value: f64, from: Unit, to: Unit, pollutant: Pollutant) -> Option<f64> {
    if from == to {
        return Some(value);
    }
    let base = value * scale(from);
    let base = match (from.is_mass(), to.is_mass()) {
        (true, true) | (false, false) => base,
        (false, true) => base * molar_factor(pollutant)?,
        (true, false) => base / molar_factor(pollutant)?,
    };
    Some(base / scale(to))
}

pub fn convert_concentration(
    concentration: Concentration,
    to: Unit,
    pollutant: Pollutant,
) -> Option<Concentration> {
    convert(concentration.value, concentration.unit, to, pollutant)
        .map(|value| Concentration::new(value, to))
}

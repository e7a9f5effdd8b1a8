//! Regional index breakpoint tables.
//!
//! Each bracket maps an index range onto a concentration range expressed in
//! the pollutant's native reporting unit (see [`native_unit`]).

use crate::types::{Pollutant, Unit};

/// One row of a breakpoint table: `[idx_lo, idx_hi] -> [conc_lo, conc_hi]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub idx_lo: f64,
    pub idx_hi: f64,
    pub conc_lo: f64,
    pub conc_hi: f64,
}

const fn b(idx_lo: f64, idx_hi: f64, conc_lo: f64, conc_hi: f64) -> Bracket {
    Bracket {
        idx_lo,
        idx_hi,
        conc_lo,
        conc_hi,
    }
}

static PM25: &[Bracket] = &[
    b(0.0, 50.0, 0.0, 9.0),
    b(51.0, 100.0, 9.1, 35.4),
    b(101.0, 150.0, 35.5, 55.4),
    b(151.0, 200.0, 55.5, 125.4),
    b(201.0, 300.0, 125.5, 225.4),
    b(301.0, 500.0, 225.5, 325.4),
];

static PM10: &[Bracket] = &[
    b(0.0, 50.0, 0.0, 54.0),
    b(51.0, 100.0, 55.0, 154.0),
    b(101.0, 150.0, 155.0, 254.0),
    b(151.0, 200.0, 255.0, 354.0),
    b(201.0, 300.0, 355.0, 424.0),
    b(301.0, 500.0, 425.0, 604.0),
];

// 8-hour brackets up to 300, 1-hour brackets above.
static O3: &[Bracket] = &[
    b(0.0, 50.0, 0.0, 54.0),
    b(51.0, 100.0, 55.0, 70.0),
    b(101.0, 150.0, 71.0, 85.0),
    b(151.0, 200.0, 86.0, 105.0),
    b(201.0, 300.0, 106.0, 200.0),
    b(301.0, 500.0, 405.0, 604.0),
];

static NO2: &[Bracket] = &[
    b(0.0, 50.0, 0.0, 53.0),
    b(51.0, 100.0, 54.0, 100.0),
    b(101.0, 150.0, 101.0, 360.0),
    b(151.0, 200.0, 361.0, 649.0),
    b(201.0, 300.0, 650.0, 1249.0),
    b(301.0, 500.0, 1250.0, 2049.0),
];

static SO2: &[Bracket] = &[
    b(0.0, 50.0, 0.0, 35.0),
    b(51.0, 100.0, 36.0, 75.0),
    b(101.0, 150.0, 76.0, 185.0),
    b(151.0, 200.0, 186.0, 304.0),
    b(201.0, 300.0, 305.0, 604.0),
    b(301.0, 500.0, 605.0, 1004.0),
];

static CO: &[Bracket] = &[
    b(0.0, 50.0, 0.0, 4.4),
    b(51.0, 100.0, 4.5, 9.4),
    b(101.0, 150.0, 9.5, 12.4),
    b(151.0, 200.0, 12.5, 15.4),
    b(201.0, 300.0, 15.5, 30.4),
    b(301.0, 500.0, 30.5, 50.4),
];

/// Returns the breakpoint table for `pollutant`, ordered by index.
pub fn table(pollutant: Pollutant) -> &'static [Bracket] {
    match pollutant {
        Pollutant::Pm25 => PM25,
        Pollutant::Pm10 => PM10,
        Pollutant::O3 => O3,
        Pollutant::No2 => NO2,
        Pollutant::So2 => SO2,
        Pollutant::Co => CO,
    }
}

/// Unit the breakpoint concentrations are tabulated in.
pub fn native_unit(pollutant: Pollutant) -> Unit {
    match pollutant {
        Pollutant::Pm25 | Pollutant::Pm10 => Unit::MicrogramsPerCubicMeter,
        Pollutant::O3 | Pollutant::No2 | Pollutant::So2 => Unit::PartsPerBillion,
        Pollutant::Co => Unit::PartsPerMillion,
    }
}

/// Interpolates `index` into the table's native concentration.
///
/// An index in the one-point gap between two integer brackets resolves to the
/// lower concentration bound of the upper bracket.
pub fn interpolate(table: &[Bracket], index: f64) -> Option<f64> {
    if !index.is_finite() || index < 0.0 {
        return None;
    }

    for bracket in table {
        if index > bracket.idx_hi {
            continue;
        }
        if index < bracket.idx_lo {
            return Some(bracket.conc_lo);
        }
        if index == bracket.idx_hi {
            return Some(bracket.conc_hi);
        }
        let span = bracket.idx_hi - bracket.idx_lo;
        if span <= 0.0 {
            return Some(bracket.conc_lo);
        }
        let fraction = (index - bracket.idx_lo) / span;
        return Some(fraction * (bracket.conc_hi - bracket.conc_lo) + bracket.conc_lo);
    }

    None
}

/// Checks that a table is non-empty, ascending and internally consistent.
pub fn validate(table: &[Bracket]) -> Result<(), String> {
    if table.is_empty() {
        return Err("breakpoint table is empty".into());
    }
    let mut prev: Option<&Bracket> = None;
    for bracket in table {
        if bracket.idx_hi < bracket.idx_lo || bracket.conc_hi < bracket.conc_lo {
            return Err(format!("inverted bracket {bracket:?}"));
        }
        if let Some(p) = prev {
            if bracket.idx_lo <= p.idx_hi || bracket.conc_lo < p.conc_hi {
                return Err(format!("bracket {bracket:?} overlaps {p:?}"));
            }
        }
        prev = Some(bracket);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables_are_valid() {
        for p in Pollutant::ALL {
            assert!(validate(table(p)).is_ok(), "table for {p} is invalid");
        }
    }

    #[test]
    fn test_every_boundary_maps_to_tabulated_concentration() {
        for p in Pollutant::ALL {
            for bracket in table(p) {
                assert_eq!(interpolate(table(p), bracket.idx_lo), Some(bracket.conc_lo));
                assert_eq!(interpolate(table(p), bracket.idx_hi), Some(bracket.conc_hi));
            }
        }
    }

    #[test]
    fn test_gap_between_brackets_snaps_to_upper_bracket() {
        assert_eq!(interpolate(PM25, 50.5), Some(9.1));
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(interpolate(PM25, 500.1), None);
        assert_eq!(interpolate(PM25, -1.0), None);
        assert_eq!(interpolate(PM25, f64::NAN), None);
    }

    #[test]
    fn test_validate_rejects_overlap() {
        let bad = [b(0.0, 50.0, 0.0, 10.0), b(40.0, 100.0, 11.0, 20.0)];
        assert!(validate(&bad).is_err());
    }
}

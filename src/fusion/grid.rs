//! Fixed lat/lon sampling grid for supplementary lookups.

use serde::{Deserialize, Serialize};

use crate::error::HealthIndexError;
use crate::types::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub bounds: BoundingBox,
    pub rows: usize,
    pub cols: usize,
}

impl Default for GridConfig {
    /// Thailand, 4 × 3 points.
    fn default() -> Self {
        Self {
            bounds: BoundingBox {
                min_lat: 5.6,
                max_lat: 20.5,
                min_lon: 97.3,
                max_lon: 105.6,
            },
            rows: 4,
            cols: 3,
        }
    }
}

/// Identifies one grid point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GridKey {
    pub row: usize,
    pub col: usize,
}

#[derive(Debug, Clone)]
pub struct SupplementGrid {
    points: Vec<(GridKey, GeoPoint)>,
}

fn axis(min: f64, max: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![(min + max) / 2.0];
    }
    let step = (max - min) / (n - 1) as f64;
    (0..n).map(|i| min + step * i as f64).collect()
}

impl SupplementGrid {
    pub fn new(config: &GridConfig) -> Result<Self, HealthIndexError> {
        let b = config.bounds;
        let finite = [b.min_lat, b.max_lat, b.min_lon, b.max_lon]
            .iter()
            .all(|v| v.is_finite());
        if !finite || b.min_lat > b.max_lat || b.min_lon > b.max_lon {
            return Err(HealthIndexError::config(format!("malformed grid bounds {b:?}")));
        }
        if !(-90.0..=90.0).contains(&b.min_lat) || !(-90.0..=90.0).contains(&b.max_lat) {
            return Err(HealthIndexError::config("grid latitude outside -90..=90"));
        }
        if !(-180.0..=180.0).contains(&b.min_lon) || !(-180.0..=180.0).contains(&b.max_lon) {
            return Err(HealthIndexError::config("grid longitude outside -180..=180"));
        }
        if config.rows == 0 || config.cols == 0 {
            return Err(HealthIndexError::config("grid needs at least one row and one column"));
        }

        let lats = axis(b.min_lat, b.max_lat, config.rows);
        let lons = axis(b.min_lon, b.max_lon, config.cols);
        let mut points = Vec::with_capacity(config.rows * config.cols);
        for (row, lat) in lats.iter().enumerate() {
            for (col, lon) in lons.iter().enumerate() {
                points.push((GridKey { row, col }, GeoPoint::new(*lat, *lon)));
            }
        }
        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[(GridKey, GeoPoint)] {
        &self.points
    }

    /// Grid point closest to `location` by planar distance. Ties go to the
    /// lower row, then the lower column.
    pub fn nearest(&self, location: GeoPoint) -> (GridKey, GeoPoint) {
        let mut best = self.points[0];
        let mut best_distance = location.planar_distance(&best.1);
        for candidate in &self.points[1..] {
            let d = location.planar_distance(&candidate.1);
            if d < best_distance {
                best = *candidate;
                best_distance = d;
            }
        }
        best
    }
}

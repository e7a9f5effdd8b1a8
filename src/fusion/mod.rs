//! Fills pollutant gaps in primary station readings from a supplementary
//! geospatial source.
//!
//! Stations are snapped to the nearest point of a fixed [`SupplementGrid`].
//! Within one [`SourceFusion::fuse`] call every distinct grid point is fetched
//! at most once: the first station that needs a point starts the request and
//! every other station needing it awaits the same shared future, whether it
//! arrives before or after the request completes.

pub mod budget;
pub mod grid;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared, join_all};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::normalizer::Normalizer;
use crate::services::{Clock, SupplementProvider};
use crate::types::{Concentrations, GeoPoint, Measurement, Pollutant, PollutantReading};

pub use budget::DailyBudget;
pub use grid::{BoundingBox, GridConfig, GridKey, SupplementGrid};

/// Supplementary data fetched for one grid point. Lives for one batch only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridSupplementPoint {
    pub grid_key: GridKey,
    pub location: GeoPoint,
    pub concentrations: Concentrations,
    pub fetched_at: DateTime<Utc>,
}

type PointFuture = Shared<BoxFuture<'static, Option<Arc<GridSupplementPoint>>>>;

/// Per-batch map of grid points to their in-flight (or finished) fetch.
#[derive(Default)]
struct BatchPoints {
    inflight: Mutex<HashMap<GridKey, PointFuture>>,
}

pub struct SourceFusion {
    provider: Option<Arc<dyn SupplementProvider>>,
    grid: SupplementGrid,
    budget: Arc<DailyBudget>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

/// Required pollutants absent from the reading. A measured zero is present.
pub fn missing_pollutants(reading: &PollutantReading, required: &[Pollutant]) -> Vec<Pollutant> {
    required
        .iter()
        .copied()
        .filter(|p| !reading.values.contains_key(p))
        .collect()
}

/// Brings supplementary values to canonical units and drops negative or
/// non-finite ones, the same check primary values go through.
fn sanitize(concentrations: Concentrations) -> Concentrations {
    let normalizer = Normalizer::new();
    concentrations
        .into_iter()
        .filter_map(|(p, c)| match normalizer.to_canonical(c.value, c.unit, p) {
            Some(canonical) => Some((p, canonical)),
            None => {
                warn!(pollutant = %p, value = c.value, unit = %c.unit, "Invalid supplementary value dropped");
                None
            }
        })
        .collect()
}

impl SourceFusion {
    pub fn new(
        provider: Option<Arc<dyn SupplementProvider>>,
        grid: SupplementGrid,
        budget: Arc<DailyBudget>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            grid,
            budget,
            clock,
            timeout,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub fn grid(&self) -> &SupplementGrid {
        &self.grid
    }

    /// Fills the `required` pollutants each station lacks, concurrently for
    /// the whole batch. Output order matches input order. Primary values are
    /// never overwritten and filled values are tagged as supplement.
    #[tracing::instrument(skip_all, fields(stations = stations.len()))]
    pub async fn fuse(&self, stations: Vec<PollutantReading>, required: &[Pollutant]) -> Vec<PollutantReading> {
        let Some(provider) = &self.provider else {
            return stations;
        };

        let batch = BatchPoints::default();
        let fused = join_all(
            stations
                .into_iter()
                .map(|station| self.fill(station, required, provider, &batch)),
        )
        .await;

        let cells = batch
            .inflight
            .lock()
            .map(|m| m.len())
            .unwrap_or_default();
        info!(cells, "Source fusion pass complete");
        fused
    }

    async fn fill(
        &self,
        mut station: PollutantReading,
        required: &[Pollutant],
        provider: &Arc<dyn SupplementProvider>,
        batch: &BatchPoints,
    ) -> PollutantReading {
        let missing = missing_pollutants(&station, required);
        if missing.is_empty() {
            return station;
        }

        let (key, location) = self.grid.nearest(station.location);
        let pending = {
            let mut inflight = batch.inflight.lock().unwrap_or_else(|e| e.into_inner());
            inflight
                .entry(key)
                .or_insert_with(|| self.start_fetch(key, location, provider.clone()))
                .clone()
        };

        let Some(point) = pending.await else {
            debug!(station_id = %station.station_id, row = key.row, col = key.col, "Gap left unfilled");
            return station;
        };

        for pollutant in missing {
            if let Some(c) = point.concentrations.get(&pollutant) {
                station.values.insert(pollutant, Measurement::supplement(*c));
            }
        }
        station
    }

    fn start_fetch(&self, key: GridKey, location: GeoPoint, provider: Arc<dyn SupplementProvider>) -> PointFuture {
        if !self.budget.try_spend(self.clock.now()) {
            return futures::future::ready(None).boxed().shared();
        }

        let clock = self.clock.clone();
        let timeout = self.timeout;
        async move {
            debug!(row = key.row, col = key.col, lat = location.lat, lon = location.lon, "Fetching grid point");
            match tokio::time::timeout(timeout, provider.fetch_point(location)).await {
                Ok(Ok(concentrations)) => Some(Arc::new(GridSupplementPoint {
                    grid_key: key,
                    location,
                    concentrations: sanitize(concentrations),
                    fetched_at: clock.now(),
                })),
                Ok(Err(e)) => {
                    warn!(row = key.row, col = key.col, error = %e, "Supplementary fetch failed");
                    None
                }
                Err(_) => {
                    warn!(row = key.row, col = key.col, timeout_secs = timeout.as_secs(), "Supplementary fetch timed out");
                    None
                }
            }
        }
        .boxed()
        .shared()
    }
}

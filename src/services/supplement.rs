//! Trait for the geospatial point source used to fill pollutant gaps.

use anyhow::Result;

use crate::types::{Concentrations, GeoPoint};

#[async_trait::async_trait]
pub trait SupplementProvider: Send + Sync {
    /// Returns canonical concentrations at `location`. Pollutants the source
    /// does not report are simply absent.
    async fn fetch_point(&self, location: GeoPoint) -> Result<Concentrations>;
}

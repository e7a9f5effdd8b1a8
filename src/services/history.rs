//! Traits for querying an external time-series store of station readings.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::types::PollutantReading;

/// Range query over a station's stored readings.
#[async_trait::async_trait]
pub trait ReadingHistory: Send + Sync {
    /// Returns every reading for `station_id` with `from <= timestamp <= to`.
    async fn readings(
        &self,
        station_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PollutantReading>>;
}

/// Access to the most recent reading of a station.
#[async_trait::async_trait]
pub trait CurrentReadings: Send + Sync {
    /// Returns the newest reading taken at or after `not_before`, if any.
    async fn latest(
        &self,
        station_id: &str,
        not_before: DateTime<Utc>,
    ) -> Result<Option<PollutantReading>>;
}

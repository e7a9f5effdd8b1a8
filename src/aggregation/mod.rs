//! Time-windowed aggregation of station readings with quality tiering.
//!
//! This module pulls a station's recent readings from the history store,
//! averages each pollutant over the window, and labels the result with a
//! quality tier derived from sample count and time coverage.

pub mod quality;
pub mod types;
pub mod utility;
pub mod window;

pub use quality::{QualityThresholds, QualityTier, TierThreshold};
pub use types::AggregateWindow;
pub use window::{AggregationSettings, TemporalAggregator};

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::aggregation::quality::QualityThresholds;
use crate::aggregation::types::AggregateWindow;
use crate::aggregation::utility::{is_valid_sample, mean};
use crate::error::HealthIndexError;
use crate::normalizer::Normalizer;
use crate::services::ReadingHistory;
use crate::types::{GeoPoint, Pollutant, PollutantReading};

/// Tunables for [`TemporalAggregator`].
#[derive(Debug, Clone)]
pub struct AggregationSettings {
    pub window: Duration,
    /// Collector cadence. Each contributing reading is assumed to stand for
    /// one poll interval when measuring coverage.
    pub poll_interval: Duration,
    pub thresholds: QualityThresholds,
    pub fetch_timeout: std::time::Duration,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            window: Duration::hours(3),
            poll_interval: Duration::minutes(10),
            thresholds: QualityThresholds::default(),
            fetch_timeout: std::time::Duration::from_secs(10),
        }
    }
}

/// Computes windowed averages from a [`ReadingHistory`].
pub struct TemporalAggregator {
    history: Arc<dyn ReadingHistory>,
    normalizer: Normalizer,
    settings: AggregationSettings,
}

impl TemporalAggregator {
    pub fn new(history: Arc<dyn ReadingHistory>, normalizer: Normalizer, settings: AggregationSettings) -> Self {
        Self {
            history,
            normalizer,
            settings,
        }
    }

    pub fn settings(&self) -> &AggregationSettings {
        &self.settings
    }

    /// Averages the window ending at `now`. `None` when the window holds no
    /// valid sample or the store could not be read.
    pub async fn aggregate(&self, station_id: &str, now: DateTime<Utc>) -> Option<AggregateWindow> {
        self.try_aggregate(station_id, now).await.ok()
    }

    /// Like [`aggregate`](Self::aggregate) but reports why nothing came back.
    #[tracing::instrument(skip(self), fields(window_minutes = self.settings.window.num_minutes()))]
    pub async fn try_aggregate(
        &self,
        station_id: &str,
        now: DateTime<Utc>,
    ) -> Result<AggregateWindow, HealthIndexError> {
        let from = now - self.settings.window;

        let query = self.history.readings(station_id, from, now);
        let readings = match tokio::time::timeout(self.settings.fetch_timeout, query).await {
            Ok(Ok(readings)) => readings,
            Ok(Err(e)) => {
                warn!(error = %e, "Reading history query failed");
                return Err(HealthIndexError::upstream("history", e));
            }
            Err(_) => {
                warn!(timeout_secs = self.settings.fetch_timeout.as_secs(), "Reading history query timed out");
                return Err(HealthIndexError::upstream("history", "timed out"));
            }
        };

        debug!(readings = readings.len(), "History readings received");
        self.summarize(station_id, from, now, &readings)
    }

    /// Pure aggregation over already-fetched readings.
    pub fn summarize(
        &self,
        station_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        readings: &[PollutantReading],
    ) -> Result<AggregateWindow, HealthIndexError> {
        let mut series: BTreeMap<Pollutant, Vec<f64>> = BTreeMap::new();
        let mut sample_count = 0usize;
        let mut earliest: Option<DateTime<Utc>> = None;
        let mut latest: Option<(DateTime<Utc>, GeoPoint)> = None;

        for reading in readings {
            if reading.timestamp < from || reading.timestamp > to {
                continue;
            }

            let canonical = reading.values.iter().filter_map(|(p, m)| {
                self.normalizer
                    .to_canonical(m.quantity, m.unit, *p)
                    .map(|c| (*p, c.value))
            });

            let mut contributed = false;
            for (pollutant, value) in canonical {
                if !is_valid_sample(value) {
                    continue;
                }
                series.entry(pollutant).or_default().push(value);
                contributed = true;
            }

            if !contributed {
                continue;
            }

            sample_count += 1;
            earliest = Some(earliest.map_or(reading.timestamp, |e| e.min(reading.timestamp)));
            if latest.is_none_or(|(t, _)| reading.timestamp >= t) {
                latest = Some((reading.timestamp, reading.location));
            }
        }

        let (Some(earliest), Some((newest, location))) = (earliest, latest) else {
            debug!("No valid samples in window");
            return Err(HealthIndexError::InsufficientData {
                station_id: station_id.to_string(),
                reason: "no valid samples in aggregation window".into(),
            });
        };

        let mut means = BTreeMap::new();
        let mut pollutant_samples = BTreeMap::new();
        for (pollutant, values) in &series {
            if let Some(avg) = mean(values) {
                means.insert(*pollutant, avg);
                pollutant_samples.insert(*pollutant, values.len());
            }
        }

        let coverage = self.coverage(earliest, newest);
        let quality_tier = self.settings.thresholds.classify(sample_count, coverage);

        debug!(sample_count, coverage, tier = %quality_tier, "Window aggregated");

        Ok(AggregateWindow {
            station_id: station_id.to_string(),
            window_start: from,
            window_end: to,
            means,
            pollutant_samples,
            sample_count,
            coverage,
            quality_tier,
            location,
        })
    }

    fn coverage(&self, earliest: DateTime<Utc>, newest: DateTime<Utc>) -> f64 {
        let window = self.settings.window.num_seconds();
        if window <= 0 {
            return 0.0;
        }
        let spanned = (newest - earliest + self.settings.poll_interval).num_seconds();
        (spanned as f64 / window as f64).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::quality::QualityTier;
    use crate::types::{Concentration, Unit};
    use anyhow::Result;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedHistory {
        readings: Vec<PollutantReading>,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ReadingHistory for FixedHistory {
        async fn readings(&self, _: &str, _: DateTime<Utc>, _: DateTime<Utc>) -> Result<Vec<PollutantReading>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.readings.clone())
        }
    }

    struct FailingHistory;

    #[async_trait::async_trait]
    impl ReadingHistory for FailingHistory {
        async fn readings(&self, _: &str, _: DateTime<Utc>, _: DateTime<Utc>) -> Result<Vec<PollutantReading>> {
            anyhow::bail!("connection refused")
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    fn reading(minutes_ago: i64, pm25: f64) -> PollutantReading {
        PollutantReading::new("bkk-01", now() - Duration::minutes(minutes_ago), GeoPoint::new(13.75, 100.5))
            .with_primary(Pollutant::Pm25, Concentration::new(pm25, Unit::MicrogramsPerCubicMeter))
    }

    fn aggregator(readings: Vec<PollutantReading>) -> TemporalAggregator {
        let history = Arc::new(FixedHistory {
            readings,
            calls: AtomicUsize::new(0),
        });
        TemporalAggregator::new(history, Normalizer::new(), AggregationSettings::default())
    }

    #[tokio::test]
    async fn test_full_window_is_excellent() {
        let readings = (0..18).map(|i| reading(i * 10, 20.0 + i as f64)).collect();
        let window = aggregator(readings).aggregate("bkk-01", now()).await.unwrap();

        assert_eq!(window.sample_count, 18);
        assert_eq!(window.coverage, 1.0);
        assert_eq!(window.quality_tier, QualityTier::Excellent);
        assert!((window.means[&Pollutant::Pm25] - 28.5).abs() < 1e-9);
        assert_eq!(window.window_start, now() - Duration::hours(3));
    }

    #[tokio::test]
    async fn test_zero_and_absent_values_are_excluded() {
        let mut silent = reading(30, 0.0);
        silent.values.clear();
        let readings = vec![reading(0, 30.0), reading(10, 0.0), silent, reading(20, 10.0)];
        let window = aggregator(readings).aggregate("bkk-01", now()).await.unwrap();

        assert_eq!(window.sample_count, 2);
        assert_eq!(window.pollutant_samples[&Pollutant::Pm25], 2);
        assert_eq!(window.means[&Pollutant::Pm25], 20.0);
        assert_eq!(window.quality_tier, QualityTier::Limited);
    }

    #[tokio::test]
    async fn test_no_valid_samples_yields_none() {
        let readings = vec![reading(0, 0.0), reading(10, 0.0)];
        let agg = aggregator(readings);
        assert!(agg.aggregate("bkk-01", now()).await.is_none());

        let err = agg.try_aggregate("bkk-01", now()).await.unwrap_err();
        assert!(matches!(err, HealthIndexError::InsufficientData { .. }));
    }

    #[tokio::test]
    async fn test_empty_history_yields_none() {
        assert!(aggregator(vec![]).aggregate("bkk-01", now()).await.is_none());
    }

    #[tokio::test]
    async fn test_readings_outside_window_are_ignored() {
        let readings = vec![reading(0, 10.0), reading(200, 500.0)];
        let window = aggregator(readings).aggregate("bkk-01", now()).await.unwrap();
        assert_eq!(window.means[&Pollutant::Pm25], 10.0);
        assert_eq!(window.sample_count, 1);
    }

    #[tokio::test]
    async fn test_half_window_is_fair() {
        let readings = (0..9).map(|i| reading(i * 10, 12.0)).collect();
        let window = aggregator(readings).aggregate("bkk-01", now()).await.unwrap();
        assert_eq!(window.coverage, 0.5);
        assert_eq!(window.quality_tier, QualityTier::Fair);
    }

    #[tokio::test]
    async fn test_gas_means_are_canonical() {
        let r = PollutantReading::new("bkk-01", now(), GeoPoint::new(13.75, 100.5))
            .with_primary(Pollutant::O3, Concentration::new(50.0, Unit::PartsPerBillion));
        let window = aggregator(vec![r]).aggregate("bkk-01", now()).await.unwrap();
        assert!((window.means[&Pollutant::O3] - 98.0).abs() < 1e-9);
        let reading = window.to_reading();
        assert_eq!(reading.values[&Pollutant::O3].unit, Unit::MicrogramsPerCubicMeter);
    }

    #[tokio::test]
    async fn test_store_failure_is_upstream_error() {
        let agg = TemporalAggregator::new(Arc::new(FailingHistory), Normalizer::new(), AggregationSettings::default());
        let err = agg.try_aggregate("bkk-01", now()).await.unwrap_err();
        assert!(matches!(err, HealthIndexError::UpstreamFetchFailure { .. }));
    }
}

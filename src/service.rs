//! Cached health index computation with a fixed fallback chain.
//!
//! For every station that misses the cache, in order:
//! 1. windowed aggregate from the history store,
//! 2. the station's current reading,
//! 3. a tagged no-data result.
//!
//! Primary data for a whole batch is resolved concurrently, then gaps are
//! filled in a single source-fusion pass before evaluation.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::aggregation::{AggregateWindow, QualityTier, TemporalAggregator};
use crate::cache::{CacheKey, InMemoryStore, ResultCache, ResultStore};
use crate::config::EngineConfig;
use crate::error::HealthIndexError;
use crate::formula::{FormulaEngine, VariantId};
use crate::fusion::{DailyBudget, SourceFusion, SupplementGrid};
use crate::normalizer::Normalizer;
use crate::result::{CalculationMethod, HealthIndexResult};
use crate::services::{Clock, CurrentReadings, ReadingHistory, SupplementProvider, SystemClock};
use crate::types::{Measurement, Pollutant, PollutantReading, SourceTag, StationId};

/// External collaborators injected into [`HealthIndexService`].
pub struct Collaborators {
    pub history: Arc<dyn ReadingHistory>,
    pub current: Arc<dyn CurrentReadings>,
    pub supplement: Option<Arc<dyn SupplementProvider>>,
    pub clock: Arc<dyn Clock>,
    pub store: Arc<dyn ResultStore>,
}

impl Collaborators {
    /// Uses one store for both history and current readings, the system
    /// clock, and an in-memory cache store.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: ReadingHistory + CurrentReadings + 'static,
    {
        Self {
            history: store.clone(),
            current: store,
            supplement: None,
            clock: Arc::new(SystemClock),
            store: Arc::new(InMemoryStore::new()),
        }
    }

    pub fn with_supplement(mut self, provider: Arc<dyn SupplementProvider>) -> Self {
        self.supplement = Some(provider);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// How a station's primary data was obtained.
#[derive(Debug, Clone, Copy)]
struct Provenance {
    method: CalculationMethod,
    quality: QualityTier,
    samples: usize,
}

/// Primary data resolved for one station before fusion.
enum Primary {
    Aggregate(AggregateWindow),
    Current(PollutantReading),
    Unavailable(String),
}

pub struct HealthIndexService {
    config: EngineConfig,
    normalizer: Normalizer,
    aggregator: TemporalAggregator,
    current: Arc<dyn CurrentReadings>,
    fusion: SourceFusion,
    engine: FormulaEngine,
    cache: ResultCache,
    clock: Arc<dyn Clock>,
}

impl HealthIndexService {
    /// Builds the engine. Fails only on invalid configuration.
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Result<Self, HealthIndexError> {
        config.validate()?;

        let normalizer = Normalizer::new();
        let engine = FormulaEngine::new(config.variants.clone(), normalizer.clone())?;
        let grid = SupplementGrid::new(&config.grid)?;

        let supplement = if config.supplement.enabled {
            collaborators.supplement
        } else {
            None
        };
        let fusion = SourceFusion::new(
            supplement,
            grid,
            Arc::new(DailyBudget::new(config.supplement.daily_budget)),
            collaborators.clock.clone(),
            config.fetch_timeout(),
        );
        let aggregator = TemporalAggregator::new(
            collaborators.history,
            normalizer.clone(),
            config.aggregation_settings(),
        );
        let cache = ResultCache::new(collaborators.store, config.cache_ttl());

        info!(
            variants = ?engine.variant_ids(),
            default_variant = %config.variant,
            supplement = fusion.is_enabled(),
            grid_points = fusion.grid().len(),
            "Health index service ready"
        );

        Ok(Self {
            config,
            normalizer,
            aggregator,
            current: collaborators.current,
            fusion,
            engine,
            cache,
            clock: collaborators.clock,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn engine(&self) -> &FormulaEngine {
        &self.engine
    }

    pub fn default_variant(&self) -> VariantId {
        self.config.variant
    }

    /// Returns the cached result for the station or computes a fresh one.
    /// Never fails: unusable data yields a no-data result.
    pub async fn get_or_compute(&self, station_id: &str, variant: VariantId) -> Arc<HealthIndexResult> {
        let mut results = self
            .get_or_compute_batch(&[station_id.to_string()], variant)
            .await;
        match results.pop() {
            Some(result) => result,
            None => Arc::new(HealthIndexResult::no_data(
                station_id,
                variant,
                "batch returned no result",
                self.clock.now(),
            )),
        }
    }

    /// Batch form of [`get_or_compute`](Self::get_or_compute). Results come
    /// back in input order; duplicate station ids are computed once.
    #[tracing::instrument(skip_all, fields(stations = station_ids.len(), %variant))]
    pub async fn get_or_compute_batch(
        &self,
        station_ids: &[StationId],
        variant: VariantId,
    ) -> Vec<Arc<HealthIndexResult>> {
        let now = self.clock.now();

        let required: Vec<Pollutant> = match self.engine.ensure_variant(variant) {
            Ok(spec) => spec.required_pollutants().collect(),
            Err(e) => {
                warn!(error = %e, "Variant not available");
                return station_ids
                    .iter()
                    .map(|id| Arc::new(HealthIndexResult::no_data(id, variant, e.to_string(), now)))
                    .collect();
            }
        };

        let mut resolved: HashMap<&str, Arc<HealthIndexResult>> = HashMap::new();
        let mut misses: Vec<&str> = Vec::new();
        for id in station_ids {
            if resolved.contains_key(id.as_str()) || misses.contains(&id.as_str()) {
                continue;
            }
            match self.cache.get(&CacheKey::new(id.as_str(), variant), now) {
                Some(hit) => {
                    debug!(station_id = %id, "Cache hit");
                    resolved.insert(id, hit);
                }
                None => misses.push(id),
            }
        }

        if !misses.is_empty() {
            for (id, result) in self.compute(&misses, variant, &required, now).await {
                resolved.insert(id, result);
            }
        }

        station_ids
            .iter()
            .map(|id| match resolved.get(id.as_str()) {
                Some(result) => result.clone(),
                None => Arc::new(HealthIndexResult::no_data(id, variant, "station was not resolved", now)),
            })
            .collect()
    }

    /// Drops the cached result for one key.
    pub fn invalidate(&self, station_id: &str, variant: VariantId) -> bool {
        self.cache.invalidate(&CacheKey::new(station_id, variant))
    }

    /// Evicts every expired cache entry.
    pub fn purge_expired(&self) -> usize {
        let purged = self.cache.purge_expired(self.clock.now());
        debug!(purged, "Expired results purged");
        purged
    }

    async fn compute<'a>(
        &self,
        station_ids: &[&'a str],
        variant: VariantId,
        required: &[Pollutant],
        now: DateTime<Utc>,
    ) -> Vec<(&'a str, Arc<HealthIndexResult>)> {
        let primaries = join_all(station_ids.iter().map(|id| self.resolve_primary(id, now))).await;

        let mut readings = Vec::new();
        let mut outcomes = Vec::with_capacity(primaries.len());
        for (id, primary) in station_ids.iter().zip(primaries) {
            let provenance = match primary {
                Primary::Aggregate(window) => {
                    readings.push(window.to_reading());
                    Provenance {
                        method: CalculationMethod::Aggregate,
                        quality: window.quality_tier,
                        samples: window.sample_count,
                    }
                }
                Primary::Current(reading) => {
                    readings.push(reading);
                    Provenance {
                        method: CalculationMethod::Current,
                        quality: QualityTier::Estimated,
                        samples: 1,
                    }
                }
                Primary::Unavailable(note) => {
                    outcomes.push((*id, Err(note)));
                    continue;
                }
            };
            outcomes.push((*id, Ok(provenance)));
        }

        let mut fused: HashMap<StationId, PollutantReading> = self
            .fusion
            .fuse(readings, required)
            .await
            .into_iter()
            .map(|r| (r.station_id.clone(), r))
            .collect();

        let mut results = Vec::with_capacity(outcomes.len());
        for (id, outcome) in outcomes {
            let result = match (outcome, fused.remove(id)) {
                (Ok(provenance), Some(reading)) => {
                    self.evaluate(id, variant, &reading, required, provenance, now)
                }
                (Ok(_), None) => HealthIndexResult::no_data(id, variant, "reading lost during fusion", now),
                (Err(note), _) => HealthIndexResult::no_data(id, variant, note, now),
            };

            let result = Arc::new(result);
            if !result.is_no_data() {
                self.cache.insert(CacheKey::new(id, variant), result.clone(), now);
            }
            info!(
                station_id = %id,
                method = %result.calculation_method,
                value = ?result.value,
                level = %result.level,
                "Health index computed"
            );
            results.push((id, result));
        }
        results
    }

    fn evaluate(
        &self,
        station_id: &str,
        variant: VariantId,
        reading: &PollutantReading,
        required: &[Pollutant],
        provenance: Provenance,
        now: DateTime<Utc>,
    ) -> HealthIndexResult {
        if !required.iter().any(|p| reading.values.contains_key(p)) {
            return HealthIndexResult::no_data(
                station_id,
                variant,
                format!("none of the pollutants required by {variant} are available"),
                now,
            );
        }

        match self.engine.evaluate(variant, &reading.concentrations()) {
            Ok(evaluation) => HealthIndexResult::computed(
                station_id,
                evaluation,
                provenance.method,
                provenance.quality,
                provenance.samples,
                reading.pollutants_from(SourceTag::Supplement),
                now,
            ),
            Err(e) => HealthIndexResult::no_data(station_id, variant, e.to_string(), now),
        }
    }

    /// Steps 1 and 2 of the chain, strictly in order.
    async fn resolve_primary(&self, station_id: &str, now: DateTime<Utc>) -> Primary {
        let aggregate_error = match self.aggregator.try_aggregate(station_id, now).await {
            Ok(window) => return Primary::Aggregate(window),
            Err(e) => e,
        };
        debug!(station_id, reason = %aggregate_error, "Aggregate unavailable, trying current reading");

        match self.current_reading(station_id, now).await {
            Ok(reading) => Primary::Current(reading),
            Err(current_error) => {
                debug!(station_id, reason = %current_error, "Current reading unavailable");
                Primary::Unavailable(format!("{aggregate_error}; {current_error}"))
            }
        }
    }

    async fn current_reading(&self, station_id: &str, now: DateTime<Utc>) -> Result<PollutantReading, HealthIndexError> {
        let not_before = now - self.config.current_lookback();
        let query = self.current.latest(station_id, not_before);
        let reading = match tokio::time::timeout(self.config.fetch_timeout(), query).await {
            Ok(Ok(reading)) => reading,
            Ok(Err(e)) => {
                warn!(station_id, error = %e, "Current reading query failed");
                return Err(HealthIndexError::upstream("current reading", e));
            }
            Err(_) => {
                warn!(station_id, "Current reading query timed out");
                return Err(HealthIndexError::upstream("current reading", "timed out"));
            }
        };

        let insufficient = |reason: &str| HealthIndexError::InsufficientData {
            station_id: station_id.to_string(),
            reason: reason.to_string(),
        };
        let mut reading = reading.ok_or_else(|| insufficient("no recent reading"))?;

        // Measured zeros are kept here; only invalid values are dropped.
        reading.values = reading
            .values
            .iter()
            .filter_map(|(p, m)| {
                self.normalizer
                    .to_canonical(m.quantity, m.unit, *p)
                    .map(|c| (*p, Measurement::primary(c)))
            })
            .collect();

        if reading.is_silent() {
            return Err(insufficient("latest reading has no measurements"));
        }
        Ok(reading)
    }
}

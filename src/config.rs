//! Engine configuration.
//!
//! Stored as a JSON object on disk; every field is optional and falls back to
//! its default:
//! ```json
//! {
//!   "variant": "thai",
//!   "window_secs": 10800,
//!   "cache_ttl_secs": 300,
//!   "grid": { "bounds": { "min_lat": 5.6, "max_lat": 20.5, "min_lon": 97.3, "max_lon": 105.6 }, "rows": 4, "cols": 3 },
//!   "supplement": { "enabled": true, "daily_budget": 1000 }
//! }
//! ```
//! Credentials never live here: `supplement.api_key_ref` names a secret that
//! a [`KeyStore`](crate::infra::keys::KeyStore) resolves at startup.

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::aggregation::{AggregationSettings, QualityThresholds};
use crate::error::HealthIndexError;
use crate::formula::variants::{self, VariantId, VariantSpec};
use crate::fusion::GridConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplementConfig {
    pub enabled: bool,
    pub daily_budget: u32,
    pub base_url: String,
    /// Name of the secret holding the API key.
    pub api_key_ref: String,
}

impl Default for SupplementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            daily_budget: 1000,
            base_url: "https://api.openweathermap.org/data/2.5/air_pollution".to_string(),
            api_key_ref: "SUPPLEMENT_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Variant used when a caller does not name one.
    pub variant: VariantId,
    pub window_secs: u64,
    pub poll_interval_secs: u64,
    pub quality: QualityThresholds,
    pub cache_ttl_secs: u64,
    /// How far back the current-reading fallback may look.
    pub current_lookback_secs: u64,
    /// Bound on every call to the history store and the supplementary source.
    pub fetch_timeout_secs: u64,
    pub grid: GridConfig,
    pub supplement: SupplementConfig,
    pub variants: Vec<VariantSpec>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            variant: VariantId::Thai,
            window_secs: 3 * 60 * 60,
            poll_interval_secs: 10 * 60,
            quality: QualityThresholds::default(),
            cache_ttl_secs: 5 * 60,
            current_lookback_secs: 24 * 60 * 60,
            fetch_timeout_secs: 10,
            grid: GridConfig::default(),
            supplement: SupplementConfig::default(),
            variants: variants::builtin(),
        }
    }
}

/// Upper bound for any configured duration: one year.
const MAX_SECS: u64 = 365 * 24 * 60 * 60;

fn secs(value: u64) -> Duration {
    Duration::seconds(value.min(MAX_SECS) as i64)
}

impl EngineConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading config '{path}'"))?;
        let config: Self =
            serde_json::from_str(&content).with_context(|| format!("parsing config '{path}'"))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), HealthIndexError> {
        if self.window_secs == 0 {
            return Err(HealthIndexError::config("aggregation window must be positive"));
        }
        if self.poll_interval_secs == 0 {
            return Err(HealthIndexError::config("poll interval must be positive"));
        }
        if self.cache_ttl_secs == 0 {
            return Err(HealthIndexError::config("cache TTL must be positive"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(HealthIndexError::config("fetch timeout must be positive"));
        }
        let durations = [
            self.window_secs,
            self.poll_interval_secs,
            self.cache_ttl_secs,
            self.current_lookback_secs,
            self.fetch_timeout_secs,
        ];
        if durations.iter().any(|d| *d > MAX_SECS) {
            return Err(HealthIndexError::config("durations are limited to one year"));
        }
        self.quality.validate().map_err(HealthIndexError::config)?;
        if !self.variants.iter().any(|v| v.id == self.variant) {
            return Err(HealthIndexError::config(format!(
                "default variant {} has no formula table",
                self.variant
            )));
        }
        Ok(())
    }

    pub fn window(&self) -> Duration {
        secs(self.window_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        secs(self.cache_ttl_secs)
    }

    pub fn current_lookback(&self) -> Duration {
        secs(self.current_lookback_secs)
    }

    pub fn fetch_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn aggregation_settings(&self) -> AggregationSettings {
        AggregationSettings {
            window: self.window(),
            poll_interval: secs(self.poll_interval_secs),
            thresholds: self.quality.clone(),
            fetch_timeout: self.fetch_timeout(),
        }
    }
}

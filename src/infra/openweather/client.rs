use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::fetch::auth::UrlParam;
use crate::fetch::{BasicClient, HttpClient, fetch_json};
use crate::normalizer::Normalizer;
use crate::services::SupplementProvider;
use crate::types::{Concentrations, GeoPoint, Pollutant, Unit};

#[derive(Debug, Deserialize)]
struct AirPollutionResponse {
    #[serde(default)]
    list: Vec<AirPollutionEntry>,
}

#[derive(Debug, Deserialize)]
struct AirPollutionEntry {
    /// Component code to µg/m³, e.g. `"pm2_5": 12.3`.
    #[serde(default)]
    components: HashMap<String, f64>,
}

/// Point query against an OpenWeather-style air pollution endpoint.
pub struct OpenWeatherClient<C> {
    http: C,
    base_url: String,
    normalizer: Normalizer,
}

impl<C: HttpClient> OpenWeatherClient<C> {
    pub fn new(http: C, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            normalizer: Normalizer::new(),
        }
    }

    fn point_url(&self, location: GeoPoint) -> String {
        format!("{}?lat={:.4}&lon={:.4}", self.base_url, location.lat, location.lon)
    }
}

impl OpenWeatherClient<UrlParam<BasicClient>> {
    /// Client that sends `api_key` as the `appid` query parameter.
    pub fn authenticated(base_url: impl Into<String>, api_key: String, timeout: Duration) -> Result<Self> {
        let http = BasicClient::with_timeout(timeout).context("building HTTP client")?;
        Ok(Self::new(UrlParam::new(http, "appid", api_key), base_url))
    }
}

/// Keeps the pollutants this engine knows, in canonical units. Unknown
/// components (`no`, `nh3`) and invalid values are dropped.
fn to_concentrations(normalizer: &Normalizer, components: &HashMap<String, f64>) -> Concentrations {
    components
        .iter()
        .filter_map(|(code, value)| {
            let pollutant = Pollutant::from_code(code)?;
            let c = normalizer.to_canonical(*value, Unit::MicrogramsPerCubicMeter, pollutant)?;
            Some((pollutant, c))
        })
        .collect()
}

#[async_trait]
impl<C: HttpClient> SupplementProvider for OpenWeatherClient<C> {
    async fn fetch_point(&self, location: GeoPoint) -> Result<Concentrations> {
        let url = self.point_url(location);
        debug!(url = %url, "Querying air pollution point");

        let response: AirPollutionResponse = fetch_json(&self.http, &url)
            .await
            .with_context(|| format!("air pollution query at ({}, {})", location.lat, location.lon))?;

        let entry = response
            .list
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("air pollution response has no entries"))?;

        Ok(to_concentrations(&self.normalizer, &entry.components))
    }
}

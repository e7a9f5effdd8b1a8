//! CLI entry point for the health index engine.
//!
//! Provides subcommands for ingesting reading feeds into the CSV store,
//! computing health indices for stations, and listing formula variants.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use health_index::fetch::{BasicClient, fetch_bytes};
use health_index::formula::VariantId;
use health_index::infra::keys::{EnvKeyStore, KeyStore};
use health_index::infra::{CsvReadingStore, OpenWeatherClient};
use health_index::normalizer::Normalizer;
use health_index::output::{append_record, print_json, print_pretty};
use health_index::parser::{normalize_record, parse_feed};
use health_index::{Collaborators, EngineConfig, HealthIndexService};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "health_index")]
#[command(about = "Compute air-quality health indices for monitoring stations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a JSON reading feed and append it to the reading store
    Ingest {
        /// Path to file or URL to fetch
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// Root directory of the reading store
        #[arg(short, long, default_value = "readings")]
        store: String,
    },
    /// Compute health indices for one or more stations
    Compute {
        /// Station ids to compute
        #[arg(value_name = "STATION", required = true)]
        stations: Vec<String>,

        /// Root directory of the reading store
        #[arg(short, long, default_value = "readings")]
        store: String,

        /// Formula variant (thai, canadian, pm25-only); defaults to the configured one
        #[arg(short, long)]
        variant: Option<String>,

        /// Engine configuration file (JSON)
        #[arg(short, long)]
        config: Option<String>,

        /// CSV file to append results to
        #[arg(short, long)]
        output: Option<String>,
    },
    /// List configured formula variants and their level tables
    Variants {
        /// Engine configuration file (JSON)
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/health_index.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("health_index.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("info")));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::try_from_env("RUST_LOG_JSON").unwrap_or_else(|_| EnvFilter::new("debug")));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest { source, store } => {
            let bytes = fetcher(&source).await?;
            let records = parse_feed(&bytes)?;
            let normalizer = Normalizer::new();
            let readings: Vec<_> = records
                .iter()
                .map(|record| normalize_record(&normalizer, record))
                .collect();

            let store = CsvReadingStore::new(&store);
            let rows = store.append_all(&readings)?;
            let silent = readings.iter().filter(|r| r.is_silent()).count();

            info!(records = records.len(), rows, silent, store = %store.root().display(), "Feed ingested");
        }
        Commands::Compute {
            stations,
            store,
            variant,
            config,
            output,
        } => {
            compute(stations, &store, variant, config.as_deref(), output.as_deref()).await?;
        }
        Commands::Variants { config } => {
            let config = load_config(config.as_deref())?;
            config.validate()?;

            for spec in &config.variants {
                let terms: Vec<String> = spec
                    .terms
                    .iter()
                    .map(|t| format!("{}:{}@{}", t.pollutant, t.beta, t.unit))
                    .collect();
                info!(
                    variant = %spec.id,
                    default = spec.id == config.variant,
                    scaling_constant = spec.scaling_constant,
                    sum_scale = spec.sum_scale,
                    floor = spec.floor,
                    precision = spec.precision,
                    terms = %terms.join(", "),
                    "Variant"
                );
                for band in &spec.levels.bands {
                    info!(variant = %spec.id, level = %band.level, from = band.from, label = %band.label, "Level");
                }
            }
        }
    }

    Ok(())
}

/// Loads feed data from a local file path or fetches it over HTTP.
#[tracing::instrument(fields(source = %url))]
async fn fetcher(url: &str) -> Result<Vec<u8>> {
    let bytes = if url.starts_with("http") {
        let client = BasicClient::new();
        fetch_bytes(&client, url).await?
    } else {
        std::fs::read(url).with_context(|| format!("reading feed file '{url}'"))?
    };
    Ok(bytes)
}

fn load_config(path: Option<&str>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path),
        None => Ok(EngineConfig::default()),
    }
}

/// Computes one batch and reports every result.
#[tracing::instrument(skip(stations, config_path, output), fields(stations = stations.len()))]
async fn compute(
    stations: Vec<String>,
    store: &str,
    variant: Option<String>,
    config_path: Option<&str>,
    output: Option<&str>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let variant: VariantId = match variant {
        Some(v) => v.parse()?,
        None => config.variant,
    };

    let mut collaborators = Collaborators::from_store(Arc::new(CsvReadingStore::new(store)));
    if config.supplement.enabled {
        match EnvKeyStore.get(&config.supplement.api_key_ref).await {
            Ok(key) => {
                let client = OpenWeatherClient::authenticated(
                    config.supplement.base_url.clone(),
                    key,
                    config.fetch_timeout(),
                )?;
                collaborators = collaborators.with_supplement(Arc::new(client));
                info!(daily_budget = config.supplement.daily_budget, "Supplementary source enabled");
            }
            Err(e) => warn!(error = %e, "Supplementary source disabled, API key unavailable"),
        }
    }

    let service = HealthIndexService::new(config, collaborators)?;
    let results = service.get_or_compute_batch(&stations, variant).await;

    for result in &results {
        print_pretty(result);
        print_json(result)?;
        if let Some(path) = output {
            append_record(path, result)?;
        }
    }

    let no_data = results.iter().filter(|r| r.is_no_data()).count();
    info!(computed = results.len() - no_data, no_data, %variant, "Batch complete");
    Ok(())
}

pub mod aggregation;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod formula;
pub mod fusion;
pub mod infra;
pub mod normalizer;
pub mod output;
pub mod parser;
pub mod result;
pub mod service;
pub mod services;
pub mod types;

pub use config::EngineConfig;
pub use error::HealthIndexError;
pub use formula::{HealthLevel, VariantId};
pub use result::{CalculationMethod, HealthIndexResult};
pub use service::{Collaborators, HealthIndexService};

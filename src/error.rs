//! Error taxonomy for the health index engine.
//!
//! Only [`HealthIndexError::InvalidConfiguration`] ever reaches a caller, and
//! only from constructors. The other variants describe why a step of the
//! fallback chain gave up and end up in logs and result notes.

use thiserror::Error;

use crate::types::Pollutant;

#[derive(Debug, Error)]
pub enum HealthIndexError {
    /// The index value lies outside every breakpoint bracket.
    #[error("no breakpoint bracket for {pollutant} index {index}")]
    ConversionUnavailable { pollutant: Pollutant, index: f64 },

    /// Not enough samples to compute a result from this source.
    #[error("insufficient data for station {station_id}: {reason}")]
    InsufficientData { station_id: String, reason: String },

    /// An external provider failed or timed out.
    #[error("{source_name} fetch failed: {message}")]
    UpstreamFetchFailure {
        source_name: &'static str,
        message: String,
    },

    /// Unknown variant or malformed tables. Fatal at setup.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl HealthIndexError {
    pub fn upstream(source_name: &'static str, err: impl std::fmt::Display) -> Self {
        HealthIndexError::UpstreamFetchFailure {
            source_name,
            message: err.to_string(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        HealthIndexError::InvalidConfiguration(message.into())
    }

    /// Whether this error must abort construction instead of degrading a result.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HealthIndexError::InvalidConfiguration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_configuration_errors_are_fatal() {
        assert!(HealthIndexError::config("bad beta").is_fatal());
        assert!(!HealthIndexError::upstream("history", "timeout").is_fatal());
        assert!(
            !HealthIndexError::ConversionUnavailable {
                pollutant: Pollutant::O3,
                index: 900.0
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_messages() {
        let err = HealthIndexError::upstream("supplement", "HTTP 503");
        assert_eq!(err.to_string(), "supplement fetch failed: HTTP 503");
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidence label for an aggregation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Estimated,
    Limited,
    Fair,
    Good,
    Excellent,
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QualityTier::Estimated => "estimated",
            QualityTier::Limited => "limited",
            QualityTier::Fair => "fair",
            QualityTier::Good => "good",
            QualityTier::Excellent => "excellent",
        };
        f.write_str(s)
    }
}

/// Minimum sample count and window coverage (0.0–1.0) for a tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThreshold {
    pub min_samples: usize,
    pub min_coverage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    pub excellent: TierThreshold,
    pub good: TierThreshold,
    pub fair: TierThreshold,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            excellent: TierThreshold {
                min_samples: 15,
                min_coverage: 1.0,
            },
            good: TierThreshold {
                min_samples: 10,
                min_coverage: 2.0 / 3.0,
            },
            fair: TierThreshold {
                min_samples: 5,
                min_coverage: 1.0 / 3.0,
            },
        }
    }
}

impl QualityThresholds {
    /// Tiers must not loosen as they get better, otherwise the tier would
    /// stop being monotonic in samples and coverage.
    pub fn validate(&self) -> Result<(), String> {
        let order = [self.fair, self.good, self.excellent];
        for t in &order {
            if !(0.0..=1.0).contains(&t.min_coverage) {
                return Err(format!("coverage threshold {} outside 0..=1", t.min_coverage));
            }
        }
        for pair in order.windows(2) {
            if pair[1].min_samples < pair[0].min_samples || pair[1].min_coverage < pair[0].min_coverage {
                return Err("quality thresholds must be non-decreasing from fair to excellent".into());
            }
        }
        if self.fair.min_samples == 0 {
            return Err("fair tier needs at least one sample".into());
        }
        Ok(())
    }

    /// Assigns a tier from sample count and window coverage.
    ///
    /// | Tier      | Samples | Coverage |
    /// |-----------|---------|----------|
    /// | excellent | >= 15   | >= 1.0   |
    /// | good      | >= 10   | >= 2/3   |
    /// | fair      | >= 5    | >= 1/3   |
    /// | limited   | > 0     | any      |
    /// | estimated | 0       | any      |
    pub fn classify(&self, samples: usize, coverage: f64) -> QualityTier {
        let meets = |t: &TierThreshold| samples >= t.min_samples && coverage + 1e-9 >= t.min_coverage;
        match samples {
            0 => QualityTier::Estimated,
            _ if meets(&self.excellent) => QualityTier::Excellent,
            _ if meets(&self.good) => QualityTier::Good,
            _ if meets(&self.fair) => QualityTier::Fair,
            _ => QualityTier::Limited,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        let t = QualityThresholds::default();
        assert_eq!(t.classify(18, 1.0), QualityTier::Excellent);
        assert_eq!(t.classify(15, 1.0), QualityTier::Excellent);
        assert_eq!(t.classify(15, 0.9), QualityTier::Good);
        assert_eq!(t.classify(14, 1.0), QualityTier::Good);
        assert_eq!(t.classify(10, 2.0 / 3.0), QualityTier::Good);
        assert_eq!(t.classify(9, 1.0), QualityTier::Fair);
        assert_eq!(t.classify(5, 1.0 / 3.0), QualityTier::Fair);
        assert_eq!(t.classify(20, 0.2), QualityTier::Limited);
        assert_eq!(t.classify(4, 1.0), QualityTier::Limited);
        assert_eq!(t.classify(1, 0.0), QualityTier::Limited);
        assert_eq!(t.classify(0, 1.0), QualityTier::Estimated);
    }

    #[test]
    fn test_tier_is_monotonic() {
        let t = QualityThresholds::default();
        for samples in 0..25 {
            for step in 0..=10 {
                let coverage = step as f64 / 10.0;
                let tier = t.classify(samples, coverage);
                assert!(t.classify(samples + 1, coverage) >= tier);
                assert!(t.classify(samples, (coverage + 0.1).min(1.0)) >= tier);
            }
        }
    }

    #[test]
    fn test_validate() {
        assert!(QualityThresholds::default().validate().is_ok());
        let mut t = QualityThresholds::default();
        t.good.min_samples = 20;
        assert!(t.validate().is_err());
    }
}

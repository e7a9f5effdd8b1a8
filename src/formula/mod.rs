//! Excess-risk formula evaluation.

pub mod levels;
pub mod variants;

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::error::HealthIndexError;
use crate::normalizer::Normalizer;
use crate::types::{Concentrations, Pollutant};

pub use levels::{HealthLevel, LevelBand, LevelTable};
pub use variants::{FormulaTerm, VariantId, VariantSpec};

/// Output of a single formula evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub variant: VariantId,
    pub value: f64,
    /// Each required pollutant's contribution to the unrounded index.
    /// Missing pollutants are present with exactly `0.0`.
    pub risk_components: BTreeMap<Pollutant, f64>,
    pub level: HealthLevel,
    pub label: String,
    /// Required pollutants that were absent from the input.
    pub missing: Vec<Pollutant>,
}

/// Holds the validated variant table. Built once, shared by reference.
#[derive(Debug, Clone)]
pub struct FormulaEngine {
    variants: HashMap<VariantId, VariantSpec>,
    normalizer: Normalizer,
}

impl FormulaEngine {
    pub fn new(specs: Vec<VariantSpec>, normalizer: Normalizer) -> Result<Self, HealthIndexError> {
        let mut variants = HashMap::new();
        for spec in specs {
            spec.validate()?;
            if variants.insert(spec.id, spec).is_some() {
                return Err(HealthIndexError::config("variant defined more than once"));
            }
        }
        if variants.is_empty() {
            return Err(HealthIndexError::config("no formula variants configured"));
        }
        Ok(Self {
            variants,
            normalizer,
        })
    }

    #[cfg(test)]
    pub fn with_builtin_variants() -> Self {
        let variants = variants::builtin().into_iter().map(|v| (v.id, v)).collect();
        Self {
            variants,
            normalizer: Normalizer::new(),
        }
    }

    pub fn spec(&self, variant: VariantId) -> Option<&VariantSpec> {
        self.variants.get(&variant)
    }

    pub fn variant_ids(&self) -> Vec<VariantId> {
        let mut ids: Vec<_> = self.variants.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn ensure_variant(&self, variant: VariantId) -> Result<&VariantSpec, HealthIndexError> {
        self.spec(variant)
            .ok_or_else(|| HealthIndexError::config(format!("variant {variant} is not configured")))
    }

    /// Evaluates `variant` over canonical concentrations.
    ///
    /// A required pollutant absent from `concentrations` contributes a zero
    /// term and is listed in [`Evaluation::missing`].
    pub fn evaluate(
        &self,
        variant: VariantId,
        concentrations: &Concentrations,
    ) -> Result<Evaluation, HealthIndexError> {
        let spec = self.ensure_variant(variant)?;
        let prefactor = 10.0 / spec.scaling_constant * spec.sum_scale;

        let mut risk_components = BTreeMap::new();
        let mut missing = Vec::new();
        let mut raw = 0.0;

        for term in &spec.terms {
            let value = concentrations
                .get(&term.pollutant)
                .map(|c| self.normalizer.to_formula_unit(*c, term.pollutant, term.unit).value)
                .filter(|v| v.is_finite() && *v >= 0.0);
            let contribution = match value {
                Some(v) => prefactor * term.term_scale * ((term.beta * v).exp() - 1.0),
                None => {
                    missing.push(term.pollutant);
                    0.0
                }
            };
            risk_components.insert(term.pollutant, contribution);
            raw += contribution;
        }

        let value = round_to(raw, spec.precision).max(spec.floor);
        let band = spec.levels.classify(value);

        debug!(%variant, raw, value, level = %band.level, missing = missing.len(), "Formula evaluated");

        Ok(Evaluation {
            variant,
            value,
            risk_components,
            level: band.level,
            label: band.label.clone(),
            missing,
        })
    }
}

fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

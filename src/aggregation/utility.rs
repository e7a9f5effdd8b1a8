/// Computes the arithmetic mean of a slice of values. Returns `None` for empty input.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// A valid sample is finite and strictly positive.
///
/// A measured zero is indistinguishable from a missing value at this stage
/// and is dropped along with it.
pub fn is_valid_sample(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Small statistics helpers for series that carry missing values.
use statrs::statistics::Statistics;

/// Mean of the defined entries, or None when there are none.
pub fn mean_of_defined(values: &[Option<f64>]) -> Option<f64> {
    let defined = values.iter().flatten().copied().collect::<Vec<f64>>();
    if defined.is_empty() {
        return None;
    }
    Some(defined.mean())
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.;
    }
    values.mean()
}

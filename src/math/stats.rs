//! Descriptive statistics over plain `f64` slices.
//!
//! Empty inputs yield `NaN` rather than panicking; callers that need a value
//! guard the length first. Standard deviations are population (ddof = 0).

/// Arithmetic mean.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    if !m.is_finite() {
        return f64::NAN;
    }
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Consecutive differences `v[i+1] - v[i]`.
pub fn diff(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// `(min, max)` of a slice, `None` when empty.
pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
    )
}

/// `max - min`, or `0.0` for an empty slice.
pub fn value_range(values: &[f64]) -> f64 {
    min_max(values).map(|(lo, hi)| hi - lo).unwrap_or(0.0)
}

/// Coefficient of determination between observations and predictions.
///
/// A constant observation vector has no variance to explain: the score is `1.0`
/// when the prediction is exact and `0.0` otherwise.
pub fn r2_score(observed: &[f64], predicted: &[f64]) -> f64 {
    let m = mean(observed);
    let ss_res: f64 = observed
        .iter()
        .zip(predicted)
        .map(|(o, p)| (o - p) * (o - p))
        .sum();
    let ss_tot: f64 = observed.iter().map(|o| (o - m) * (o - m)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Root-mean-square of `observed - predicted`.
pub fn rmse(observed: &[f64], predicted: &[f64]) -> f64 {
    let n = observed.len().min(predicted.len());
    if n == 0 {
        return f64::NAN;
    }
    let sse: f64 = observed
        .iter()
        .zip(predicted)
        .map(|(o, p)| (o - p) * (o - p))
        .sum();
    (sse / n as f64).sqrt()
}

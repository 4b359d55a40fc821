//! Heuristic detection of pathological amplification traces.
//!
//! The detector works on the raw series only and never looks at the sigmoid
//! fit. Each check compares a statistic against a threshold that scales with the
//! well's own response range, so the same rules work across instruments, signal
//! magnitudes and run lengths.
//!
//! Checks run in a fixed order and each appends at most one tag:
//!
//! | tag | trigger |
//! |---|---|
//! | `low_amplitude` | response range `< max(50, 0.1 × range)` |
//! | `early_plateau` | std of the back half `< max(20, 0.05 × range)` |
//! | `unstable_baseline` | std of the first fifth (≥ 3 points) `> max(50, 0.15 × range)` |
//! | `negative_amplification` | steepest drop inside the exponential-phase window `< -max(30, 0.1 × range)` |
//! | `negative_rfu_values` | any response `< 0` |
//! | `high_noise` | std of consecutive differences `> 0.3 × range` (more than 5 points) |
//!
//! The exponential-phase window is estimated from index fractions of the series,
//! not detected kinetically.

use crate::domain::{AnomalyTag, SeriesError, ValidSeries};
use crate::math::{diff, std_dev, value_range};

/// Tag every known pathology of one well's trace.
///
/// Identical input always yields the identical, ordered tag list.
pub fn detect_curve_anomalies(cycles: &[f64], rfu: &[f64]) -> Vec<AnomalyTag> {
    let series = match ValidSeries::from_raw(cycles, rfu) {
        Ok(series) => series,
        Err(SeriesError::InsufficientData { .. }) => return vec![AnomalyTag::InsufficientData],
        Err(SeriesError::InsufficientValidData { .. }) => return vec![AnomalyTag::InsufficientValidData],
    };
    detect_series_anomalies(&series.rfu)
}

/// Run the shape checks on an already validated response sequence.
pub fn detect_series_anomalies(rfu: &[f64]) -> Vec<AnomalyTag> {
    let range = value_range(rfu);
    let baseline_points = baseline_len(rfu.len());

    let checks: [(AnomalyTag, bool); 6] = [
        (AnomalyTag::LowAmplitude, is_low_amplitude(range)),
        (AnomalyTag::EarlyPlateau, has_early_plateau(rfu, range)),
        (AnomalyTag::UnstableBaseline, has_unstable_baseline(rfu, range, baseline_points)),
        (
            AnomalyTag::NegativeAmplification,
            has_negative_amplification(rfu, range, baseline_points),
        ),
        (AnomalyTag::NegativeRfuValues, rfu.iter().any(|&v| v < 0.0)),
        (AnomalyTag::HighNoise, is_high_noise(rfu, range)),
    ];

    checks
        .into_iter()
        .filter_map(|(tag, triggered)| triggered.then_some(tag))
        .collect()
}

/// First fifth of the run, at least three points.
fn baseline_len(n: usize) -> usize {
    3.max(n / 5)
}

fn is_low_amplitude(range: f64) -> bool {
    range < 50f64.max(range * 0.1)
}

fn has_early_plateau(rfu: &[f64], range: f64) -> bool {
    let n = rfu.len();
    let split = (n / 2).min(n.saturating_sub(5));
    if split == 0 {
        return false;
    }
    std_dev(&rfu[split..]) < 20f64.max(range * 0.05)
}

fn has_unstable_baseline(rfu: &[f64], range: f64, baseline_points: usize) -> bool {
    let end = baseline_points.min(rfu.len());
    std_dev(&rfu[..end]) > 50f64.max(range * 0.15)
}

/// Steepest point-to-point drop inside `[start, end)`, where the window starts
/// after the baseline (or a quarter of the run) and spans a third of the run.
fn has_negative_amplification(rfu: &[f64], range: f64, baseline_points: usize) -> bool {
    let n = rfu.len();
    let start = baseline_points.max(n / 4);
    let end = n.saturating_sub(1).min(start + n / 3);
    if end <= start {
        return false;
    }
    let window = &rfu[start..end];
    if window.len() <= 2 {
        return false;
    }
    let steepest_drop = diff(window).into_iter().fold(f64::INFINITY, f64::min);
    steepest_drop < -(30f64.max(range * 0.1))
}

fn is_high_noise(rfu: &[f64], range: f64) -> bool {
    if rfu.len() <= 5 {
        return false;
    }
    std_dev(&diff(rfu)) > range * 0.3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SigmoidParams, evaluate_curve};

    fn cycles(n: usize) -> Vec<f64> {
        (1..=n).map(|c| c as f64).collect()
    }

    fn clean_sigmoid() -> (Vec<f64>, Vec<f64>) {
        let x = cycles(40);
        let y = evaluate_curve(&x, &SigmoidParams::new(1000.0, 0.5, 20.0, 100.0));
        (x, y)
    }

    #[test]
    fn clean_sigmoid_has_no_anomalies() {
        let (x, y) = clean_sigmoid();
        assert!(detect_curve_anomalies(&x, &y).is_empty());
    }

    #[test]
    fn flat_trace_is_low_amplitude() {
        let x = cycles(30);
        let y = vec![250.0; 30];
        assert_eq!(
            detect_curve_anomalies(&x, &y),
            vec![AnomalyTag::LowAmplitude, AnomalyTag::EarlyPlateau]
        );
    }

    #[test]
    fn negative_spike_in_growth_phase_is_flagged() {
        let (x, mut y) = clean_sigmoid();
        y[20] -= 400.0;
        assert_eq!(detect_curve_anomalies(&x, &y), vec![AnomalyTag::NegativeAmplification]);
    }

    #[test]
    fn negative_values_are_flagged() {
        let x = cycles(40);
        let y = evaluate_curve(&x, &SigmoidParams::new(1000.0, 0.5, 20.0, -20.0));
        assert!(detect_curve_anomalies(&x, &y).contains(&AnomalyTag::NegativeRfuValues));
    }

    #[test]
    fn alternating_trace_is_noisy_and_unstable() {
        let x = cycles(30);
        let y: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 300.0 } else { 700.0 }).collect();
        assert_eq!(
            detect_curve_anomalies(&x, &y),
            vec![
                AnomalyTag::UnstableBaseline,
                AnomalyTag::NegativeAmplification,
                AnomalyTag::HighNoise,
            ]
        );
    }

    #[test]
    fn short_and_non_finite_series_return_early() {
        assert_eq!(
            detect_curve_anomalies(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]),
            vec![AnomalyTag::InsufficientData]
        );
        let x = cycles(6);
        let y = [1.0, f64::NAN, f64::NAN, 4.0, 5.0, f64::NAN];
        assert_eq!(detect_curve_anomalies(&x, &y), vec![AnomalyTag::InsufficientValidData]);
    }

    #[test]
    fn detection_is_deterministic() {
        let (x, mut y) = clean_sigmoid();
        y[12] -= 300.0;
        y[30] = -5.0;
        let first = detect_curve_anomalies(&x, &y);
        let second = detect_curve_anomalies(&x, &y);
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn five_point_series_skips_plateau_and_noise_checks() {
        let x = cycles(5);
        let y = [100.0, 100.0, 100.0, 100.0, 100.0];
        assert_eq!(detect_curve_anomalies(&x, &y), vec![AnomalyTag::LowAmplitude]);
    }

    /// Flat trace with one reading dropped by 1000 at `index`.
    fn dip_at(n: usize, index: usize) -> Vec<f64> {
        let mut y = vec![0.0; n];
        y[index] = -1000.0;
        y
    }

    /// Flat trace with one reading raised by 1000 at each of `indices`.
    fn bumps_at(n: usize, indices: &[usize]) -> Vec<f64> {
        let mut y = vec![0.0; n];
        for &i in indices {
            y[i] = 1000.0;
        }
        y
    }

    #[test]
    fn baseline_is_a_fifth_with_three_point_floor() {
        for (n, expected) in [(5, 3), (10, 3), (14, 3), (15, 3), (20, 4), (25, 5), (40, 8), (41, 8)] {
            assert_eq!(baseline_len(n), expected, "n={n}");
        }
    }

    #[test]
    fn drop_is_seen_only_inside_the_exponential_window() {
        // n=40: baseline 8, window [max(8, 40/4), min(39, 10 + 13)) = [10, 23).
        // n=10: baseline 3, window [max(3, 10/4), min(9, 3 + 3)) = [3, 6).
        // A dip at `i` shows as the drop from i-1 to i, so it counts for i in [start+1, end-1].
        let cases = [
            (40, 10, false),
            (40, 11, true),
            (40, 12, true),
            (40, 22, true),
            (40, 23, false),
            (40, 30, false),
            (10, 3, false),
            (10, 4, true),
            (10, 5, true),
            (10, 6, false),
        ];
        for (n, index, expected) in cases {
            let y = dip_at(n, index);
            let got = has_negative_amplification(&y, value_range(&y), baseline_len(n));
            assert_eq!(got, expected, "n={n} dip at {index}");
        }
    }

    #[test]
    fn window_start_follows_quarter_of_run() {
        let x = cycles(40);
        let y = dip_at(40, 11);
        assert_eq!(
            detect_curve_anomalies(&x, &y),
            vec![
                AnomalyTag::EarlyPlateau,
                AnomalyTag::NegativeAmplification,
                AnomalyTag::NegativeRfuValues,
            ]
        );
    }

    #[test]
    fn baseline_noise_counts_only_within_first_fifth() {
        // n=40: baseline covers indices 0..8; indices 8 and 9 lie between n/5 and n/4.
        let outside = bumps_at(40, &[8, 9]);
        assert!(!has_unstable_baseline(&outside, 1000.0, baseline_len(40)));

        let inside = bumps_at(40, &[6, 7]);
        assert!(has_unstable_baseline(&inside, 1000.0, baseline_len(40)));
    }

    #[test]
    fn noise_threshold_is_three_tenths_of_range() {
        // A single bump gives diffs {+r, -r, 0...}: std(diff) / range = sqrt(2 / (n - 1)).
        let y = bumps_at(13, &[6]);
        let ratio = std_dev(&diff(&y)) / value_range(&y);
        assert!(ratio > 0.3 && ratio < 0.5, "ratio={ratio}");
        assert!(is_high_noise(&y, value_range(&y)));

        let y = bumps_at(30, &[15]);
        let ratio = std_dev(&diff(&y)) / value_range(&y);
        assert!(ratio < 0.3, "ratio={ratio}");
        assert!(!is_high_noise(&y, value_range(&y)));
    }
}

//! Order statistics for noisy depth and length samples.

use std::cmp::Ordering;

/// Percentile with linear interpolation between closest ranks.
///
/// `sorted` must be sorted ascending and non-empty; `pct` is in `[0, 100]`.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() as f64 - 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Median of a sorted, non-empty slice; the mean of the two middle values for even lengths.
pub fn median(sorted: &[f64]) -> f64 {
    debug_assert!(!sorted.is_empty());
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Median after discarding values outside `[Q1 - k·IQR, Q3 + k·IQR]`.
///
/// Falls back to the unfiltered median if the fence rejects everything.
/// Returns `None` for an empty sample.
pub fn iqr_filtered_median(values: &[f64], factor: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let q1 = percentile(&sorted, 25.0);
    let q3 = percentile(&sorted, 75.0);
    let iqr = q3 - q1;
    let lower = q1 - factor * iqr;
    let upper = q3 + factor * iqr;

    let kept: Vec<f64> = sorted
        .iter()
        .copied()
        .filter(|v| *v >= lower && *v <= upper)
        .collect();
    if kept.is_empty() {
        return Some(median(&sorted));
    }
    Some(median(&kept))
}

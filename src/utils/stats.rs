//! Statistical utility functions.
//!
//! All functions ignore NaN entries; an input without valid values yields NaN.

use statrs::statistics::Statistics;

fn valid(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| !v.is_nan()).collect()
}

fn sorted_valid(values: &[f64]) -> Vec<f64> {
    let mut sorted = valid(values);
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted
}

/// Mean of the valid values.
pub fn mean(values: &[f64]) -> f64 {
    let v = valid(values);
    if v.is_empty() {
        return f64::NAN;
    }
    v.iter().mean()
}

/// Population standard deviation (denominator `n`) of the valid values.
pub fn population_std(values: &[f64]) -> f64 {
    let v = valid(values);
    if v.is_empty() {
        return f64::NAN;
    }
    v.iter().population_std_dev()
}

/// Smallest valid value.
pub fn min(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::NAN, f64::min)
}

/// Largest valid value.
pub fn max(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::NAN, f64::max)
}

/// Quantile taking the order statistic at or above `q * (n - 1)`.
pub fn quantile_higher(values: &[f64], q: f64) -> f64 {
    let sorted = sorted_valid(values);
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = (q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64).ceil() as usize;
    sorted[pos.min(sorted.len() - 1)]
}

/// Quantile taking the order statistic at or below `q * (n - 1)`.
pub fn quantile_lower(values: &[f64], q: f64) -> f64 {
    let sorted = sorted_valid(values);
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = (q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64).floor() as usize;
    sorted[pos]
}

/// Median of the valid values.
pub fn median(values: &[f64]) -> f64 {
    let sorted = sorted_valid(values);
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Whether every valid value is 0 or 1.
pub fn is_binary(values: &[f64]) -> bool {
    values
        .iter()
        .filter(|v| !v.is_nan())
        .all(|&v| v == 0.0 || v == 1.0)
}

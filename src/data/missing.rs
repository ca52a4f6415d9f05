//! Gap detection and imputation.

use crate::core::{Frequency, Series, TARGET_COLUMN};
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Imputation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImputeConfig {
    /// Fill gaps at all; if false every gap is either dropped or an error.
    pub impute_missing: bool,
    /// Longest run of missing values filled by linear interpolation.
    pub impute_linear: usize,
    /// Longest run of missing values filled by a rolling average.
    pub impute_rolling: usize,
    /// Drop rows that remain missing instead of failing.
    pub drop_missing: bool,
}

impl Default for ImputeConfig {
    fn default() -> Self {
        Self {
            impute_missing: true,
            impute_linear: 10,
            impute_rolling: 10,
            drop_missing: false,
        }
    }
}

/// Columns the handler touches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImputeColumns<'a> {
    /// Regressor columns imputed alongside the target.
    pub regressors: &'a [String],
    /// Event columns; missing entries become 0.
    pub events: &'a [String],
}

/// Insert NaN rows for timestamps missing from the regular grid.
///
/// Fails with `FrequencyInference` if an existing timestamp is off the grid.
pub fn regularize(series: &Series, frequency: Frequency) -> Result<Series> {
    let (Some(first), Some(last)) = (series.first_timestamp(), series.last_timestamp()) else {
        return Ok(series.clone());
    };
    frequency.check_spacing(series.timestamps())?;
    let grid = frequency.range(first, last)?;
    if grid.len() == series.len() {
        return Ok(series.clone().with_frequency(frequency));
    }

    debug!(
        series = series.id(),
        inserted = grid.len() - series.len(),
        "regularized series to {frequency}"
    );

    let mut positions = Vec::with_capacity(series.len());
    let mut g = 0;
    for ts in series.timestamps() {
        while grid[g] < *ts {
            g += 1;
        }
        positions.push(g);
    }

    let mut columns = BTreeMap::new();
    for (name, values) in series.columns() {
        let mut filled = vec![f64::NAN; grid.len()];
        for (&p, &v) in positions.iter().zip(values) {
            filled[p] = v;
        }
        columns.insert(name.clone(), filled);
    }
    Ok(Series::new(series.id(), grid, columns)?.with_frequency(frequency))
}

/// Runs of consecutive NaNs as `(start, length)`.
pub fn nan_runs(values: &[f64]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut i = 0;
    while i < values.len() {
        if values[i].is_nan() {
            let start = i;
            while i < values.len() && values[i].is_nan() {
                i += 1;
            }
            runs.push((start, i - start));
        } else {
            i += 1;
        }
    }
    runs
}

/// Linearly interpolate runs of at most `limit` NaNs.
///
/// Runs touching either end take the nearest valid value. Returns the number
/// of values filled.
pub fn interpolate_linear(values: &mut [f64], limit: usize) -> usize {
    let n = values.len();
    let mut filled = 0;
    for (start, len) in nan_runs(values) {
        if len > limit || len == n {
            continue;
        }
        let end = start + len;
        match (start.checked_sub(1), (end < n).then_some(end)) {
            (Some(a), Some(b)) => {
                let (va, vb) = (values[a], values[b]);
                let span = (b - a) as f64;
                for i in start..end {
                    values[i] = va + (vb - va) * (i - a) as f64 / span;
                }
            }
            (Some(a), None) => {
                let v = values[a];
                values[start..end].fill(v);
            }
            (None, Some(b)) => {
                let v = values[b];
                values[start..end].fill(v);
            }
            (None, None) => continue,
        }
        filled += len;
    }
    filled
}

/// Centered rolling mean over valid values.
///
/// Entries with fewer than `min_periods` valid neighbours are NaN.
pub fn rolling_mean_valid(values: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    let n = values.len();
    if n == 0 || window == 0 {
        return vec![f64::NAN; n];
    }
    let half = window / 2;
    (0..n)
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + window - half).min(n);
            let (sum, count) = values[start..end]
                .iter()
                .filter(|v| !v.is_nan())
                .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
            if count >= min_periods.max(1) {
                sum / count as f64
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Fill runs of at most `rolling` NaNs with a centered rolling average.
///
/// The window spans `rolling + 2 * linear` rows and needs at least
/// `max(1, 2 * linear)` valid values. Returns the number of values filled.
pub fn fill_rolling(values: &mut [f64], rolling: usize, linear: usize) -> usize {
    if rolling == 0 {
        return 0;
    }
    let window = rolling + 2 * linear;
    let min_periods = (2 * linear).max(1);
    let means = rolling_mean_valid(values, window, min_periods);
    let mut filled = 0;
    for (start, len) in nan_runs(values) {
        if len > rolling {
            continue;
        }
        for i in start..start + len {
            if !means[i].is_nan() {
                values[i] = means[i];
                filled += 1;
            }
        }
    }
    filled
}

/// Impute or drop missing values of the target and regressor columns.
///
/// The last `future_rows` rows hold unknown future targets; they are kept out
/// of imputation and re-appended untouched. With `n_lags == 0` rows lacking a
/// target are dropped first. Event columns have NaN replaced by 0. Rows still
/// missing afterwards are excised (recorded as breaks) when
/// `config.drop_missing` is set; otherwise the call fails with `MissingData`.
pub fn handle_missing(
    series: &Series,
    columns: ImputeColumns<'_>,
    config: &ImputeConfig,
    n_lags: usize,
    future_rows: usize,
) -> Result<Series> {
    let mut series = series.clone();
    for name in columns.events {
        if let Some(values) = series.column_opt(name) {
            let zeroed = values.iter().map(|v| if v.is_nan() { 0.0 } else { *v }).collect();
            series.set_column(name.clone(), zeroed)?;
        }
    }

    let split = series.len().saturating_sub(future_rows);
    let future = series.slice(split, series.len())?;
    let mut history = series.slice(0, split)?;

    if n_lags == 0 && history.missing_count(TARGET_COLUMN) > 0 {
        let keep: Vec<usize> = (0..history.len())
            .filter(|&i| !history.target()[i].is_nan())
            .collect();
        debug!(
            series = history.id(),
            dropped = history.len() - keep.len(),
            "dropping rows without target"
        );
        history = history.select_rows(&keep);
    }

    let mut processed: Vec<&str> = vec![TARGET_COLUMN];
    processed.extend(columns.regressors.iter().map(String::as_str));

    for &name in &processed {
        let Some(values) = history.column_opt(name) else {
            continue;
        };
        let missing = values.iter().filter(|v| v.is_nan()).count();
        if missing == 0 || !config.impute_missing {
            continue;
        }
        let mut values = values.to_vec();
        let linear = interpolate_linear(&mut values, config.impute_linear);
        let rolling = fill_rolling(&mut values, config.impute_rolling, config.impute_linear);
        info!(
            series = history.id(),
            column = name,
            missing,
            linear,
            rolling,
            "imputed missing values"
        );
        history.set_column(name, values)?;
    }

    let unresolved: Vec<(&str, usize)> = processed
        .iter()
        .map(|&name| (name, history.missing_count(name)))
        .filter(|&(_, count)| count > 0)
        .collect();

    if let Some(&(column, count)) = unresolved.first() {
        if !config.drop_missing {
            return Err(ForecastError::MissingData {
                column: column.to_string(),
                count,
            });
        }
        let keep: Vec<usize> = (0..history.len())
            .filter(|&i| {
                processed
                    .iter()
                    .all(|name| history.column_opt(name).map_or(true, |v| !v[i].is_nan()))
            })
            .collect();
        info!(
            series = history.id(),
            dropped = history.len() - keep.len(),
            "dropping rows with unresolved missing values"
        );
        history = history.select_rows(&keep);
    }

    if !future.is_empty() {
        history.append(&future)?;
    }
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    const NAN: f64 = f64::NAN;

    fn days(n: usize) -> Vec<DateTime<Utc>> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n).map(|i| base + Duration::days(i as i64)).collect()
    }

    fn series(values: Vec<f64>) -> Series {
        Series::univariate("a", days(values.len()), values).unwrap()
    }

    #[test]
    fn regularize_inserts_missing_rows() {
        let ts = days(5);
        let s = Series::univariate(
            "a",
            vec![ts[0], ts[1], ts[3], ts[4]],
            vec![1.0, 2.0, 4.0, 5.0],
        )
        .unwrap();
        let r = regularize(&s, Frequency::days(1)).unwrap();

        assert_eq!(r.len(), 5);
        assert!(r.target()[2].is_nan());
        assert_eq!(r.target()[3], 4.0);
        assert_eq!(r.frequency(), Some(Frequency::days(1)));
    }

    #[test]
    fn regularize_rejects_off_grid_timestamps() {
        let ts = days(3);
        let s = Series::univariate(
            "a",
            vec![ts[0], ts[1] + Duration::hours(3), ts[2]],
            vec![1.0, 2.0, 3.0],
        )
        .unwrap();
        assert!(matches!(
            regularize(&s, Frequency::days(1)),
            Err(ForecastError::FrequencyInference(_))
        ));
    }

    #[test]
    fn finds_nan_runs() {
        assert_eq!(
            nan_runs(&[NAN, 1.0, NAN, NAN, 2.0, NAN]),
            vec![(0, 1), (2, 2), (5, 1)]
        );
    }

    #[test]
    fn interpolates_short_gaps_only() {
        let mut v = vec![0.0, NAN, NAN, 3.0, NAN, NAN, NAN, 7.0];
        let filled = interpolate_linear(&mut v, 2);

        assert_eq!(filled, 2);
        assert_relative_eq!(v[1], 1.0);
        assert_relative_eq!(v[2], 2.0);
        assert!(v[4].is_nan());
    }

    #[test]
    fn edge_gaps_take_nearest_value() {
        let mut v = vec![NAN, 2.0, 3.0, NAN];
        interpolate_linear(&mut v, 1);
        assert_eq!(v, vec![2.0, 2.0, 3.0, 3.0]);
    }

    #[test]
    fn rolling_fills_what_linear_left() {
        let mut v = vec![1.0, 1.0, 1.0, NAN, NAN, NAN, 3.0, 3.0, 3.0];
        assert_eq!(interpolate_linear(&mut v, 1), 0);
        let filled = fill_rolling(&mut v, 3, 1);

        assert_eq!(filled, 3);
        assert!(v.iter().all(|x| !x.is_nan()));
        assert!(v[3] < v[5]);
    }

    #[test]
    fn long_gaps_remain_and_fail_without_drop() {
        let mut values = vec![1.0; 30];
        for v in values.iter_mut().skip(5).take(25) {
            *v = NAN;
        }
        values[29] = 2.0;
        let s = series(values);
        let config = ImputeConfig::default();

        let err = handle_missing(&s, ImputeColumns::default(), &config, 2, 0).unwrap_err();
        assert!(matches!(err, ForecastError::MissingData { ref column, count } if column == "y" && count > 0));
    }

    #[test]
    fn drop_missing_excises_rows_and_records_breaks() {
        let mut values: Vec<f64> = (0..40).map(|i| i as f64).collect();
        for v in values.iter_mut().skip(10).take(15) {
            *v = NAN;
        }
        let s = series(values);
        let config = ImputeConfig {
            impute_linear: 2,
            impute_rolling: 2,
            drop_missing: true,
            ..Default::default()
        };
        let out = handle_missing(&s, ImputeColumns::default(), &config, 2, 0).unwrap();

        assert_eq!(out.len(), 25);
        assert_eq!(out.breaks(), &[10]);
        assert_eq!(out.missing_count("y"), 0);
    }

    #[test]
    fn no_imputation_with_drop_removes_every_gap() {
        let s = series(vec![1.0, NAN, 3.0, 4.0]);
        let config = ImputeConfig {
            impute_missing: false,
            drop_missing: true,
            ..Default::default()
        };
        let out = handle_missing(&s, ImputeColumns::default(), &config, 1, 0).unwrap();
        assert_eq!(out.target(), &[1.0, 3.0, 4.0]);
    }

    #[test]
    fn future_rows_are_left_untouched() {
        let s = series(vec![1.0, NAN, 3.0, NAN, NAN]);
        let out = handle_missing(&s, ImputeColumns::default(), &ImputeConfig::default(), 2, 2)
            .unwrap();

        assert_eq!(out.len(), 5);
        assert_relative_eq!(out.target()[1], 2.0);
        assert!(out.target()[3].is_nan());
        assert!(out.target()[4].is_nan());
    }

    #[test]
    fn without_lags_missing_targets_are_dropped() {
        let s = series(vec![1.0, NAN, 3.0]);
        let out = handle_missing(&s, ImputeColumns::default(), &ImputeConfig::default(), 0, 0)
            .unwrap();
        assert_eq!(out.target(), &[1.0, 3.0]);
    }

    #[test]
    fn events_are_zero_filled_and_regressors_imputed() {
        let mut s = series(vec![1.0, 2.0, 3.0, 4.0]);
        s.set_column("holiday", vec![1.0, NAN, NAN, 1.0]).unwrap();
        s.set_column("temp", vec![10.0, NAN, 30.0, 40.0]).unwrap();
        let regressors = vec!["temp".to_string()];
        let events = vec!["holiday".to_string()];
        let cols = ImputeColumns {
            regressors: &regressors,
            events: &events,
        };
        let out = handle_missing(&s, cols, &ImputeConfig::default(), 1, 0).unwrap();

        assert_eq!(out.column("holiday").unwrap(), &[1.0, 0.0, 0.0, 1.0]);
        assert_relative_eq!(out.column("temp").unwrap()[1], 20.0);
    }
}

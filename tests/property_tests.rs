//! Property-based tests for data preparation.
//!
//! These tests verify invariants of windowing, normalization and splitting
//! that should hold for all valid inputs, using randomly generated series.

use anofox_neural::core::Series;
use anofox_neural::data::{
    expected_window_count, split_series, NormalizeMode, PredictionFrequency, ShiftScale,
    ValidSize, WindowConfig, WindowMode, WindowSet, TIME_FEATURE,
};
use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use proptest::prelude::*;

fn hours(n: usize) -> Vec<DateTime<Utc>> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..n).map(|i| base + Duration::hours(i as i64)).collect()
}

/// Series with a time column, ready for windowing.
fn make_series(values: &[f64]) -> Series {
    let mut series = Series::univariate("s", hours(values.len()), values.to_vec()).unwrap();
    let t = (0..values.len()).map(|i| i as f64 / values.len() as f64).collect();
    series.set_column(TIME_FEATURE, t).unwrap();
    series
}

/// Strategy for generating finite series values.
fn values_strategy(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1000.0..1000.0_f64, min_len..max_len)
}

fn mode_strategy() -> impl Strategy<Value = NormalizeMode> {
    prop_oneof![
        Just(NormalizeMode::Auto),
        Just(NormalizeMode::Soft),
        Just(NormalizeMode::Soft1),
        Just(NormalizeMode::MinMax),
        Just(NormalizeMode::Standardize),
        Just(NormalizeMode::Off),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn complete_series_yield_every_window(
        values in values_strategy(1, 120),
        n_lags in 1usize..12,
        n_forecasts in 1usize..6,
    ) {
        let series = make_series(&values);
        let config = WindowConfig { n_lags, n_forecasts, ..Default::default() };
        let set = WindowSet::new(&series, &config, WindowMode::Train).unwrap();
        prop_assert_eq!(set.len(), expected_window_count(values.len(), n_lags, n_forecasts));

        for window in set.iter() {
            let i = window.target_start;
            prop_assert_eq!(&window.lags[..], &values[i - n_lags..i]);
            prop_assert_eq!(&window.targets[..], &values[i..i + n_forecasts]);
        }
    }

    #[test]
    fn missing_targets_never_reach_training(
        values in values_strategy(20, 80),
        holes in prop::collection::vec(0usize..80, 1..5),
    ) {
        let mut values = values;
        for h in holes {
            if h < values.len() {
                values[h] = f64::NAN;
            }
        }
        let series = make_series(&values);
        let config = WindowConfig { n_lags: 3, n_forecasts: 2, ..Default::default() };
        let set = WindowSet::new(&series, &config, WindowMode::Train).unwrap();
        for window in set.iter() {
            prop_assert!(window.lags.iter().chain(&window.targets).all(|v| v.is_finite()));
        }
    }

    #[test]
    fn origins_satisfy_the_rule(
        values in values_strategy(30, 150),
        hour in 0u32..24,
    ) {
        let series = make_series(&values);
        let rule = PredictionFrequency { daily_hour: Some(hour), ..Default::default() };
        let config = WindowConfig {
            n_lags: 4,
            n_forecasts: 2,
            prediction_frequency: rule,
            ..Default::default()
        };
        let set = WindowSet::new(&series, &config, WindowMode::Train).unwrap();
        for window in set.iter() {
            let origin = window.origin.unwrap();
            prop_assert_eq!(origin.hour(), hour);
            prop_assert_eq!(origin, series.timestamps()[window.target_start - 1]);
        }
    }

    #[test]
    fn normalization_inverts(
        values in values_strategy(2, 60),
        mode in mode_strategy(),
    ) {
        let ss = ShiftScale::fit(&values, mode);
        prop_assert!(ss.scale.is_finite() && ss.scale != 0.0);
        for &v in &values {
            let back = ss.invert(ss.apply(v));
            prop_assert!((back - v).abs() <= 1e-9 * v.abs().max(1.0));
        }
    }

    #[test]
    fn split_parts_overlap_by_the_lags(
        len in 30usize..200,
        n_lags in 0usize..8,
        n_forecasts in 1usize..4,
        pct in 0.05..0.5_f64,
    ) {
        let series = Series::univariate("s", hours(len), vec![1.0; len]).unwrap();
        let (train, val) = split_series(&series, n_lags, n_forecasts, ValidSize::Fraction(pct)).unwrap();
        prop_assert_eq!(train.len() + val.len(), len + n_lags);
        prop_assert_eq!(val.first_timestamp(), Some(series.timestamps()[train.len() - n_lags]));
    }
}

//! End-to-end tests of the forecaster: fitting, prediction, splitting and
//! multi-series handling.

use anofox_neural::core::{EventTable, Frequency, InputShape, RegressorTable, Series, TimeFrame};
use anofox_neural::data::{
    crossvalidation_split_series, unfold_dict_of_folds, FoldConfig, GlobalCvType, NormalizeMode,
    PredictionFrequency, ValidSize,
};
use anofox_neural::error::ForecastError;
use anofox_neural::features::FeatureMode;
use anofox_neural::models::{LagSpec, ModelConfig, NeuralForecaster};
use anofox_neural::utils::MetricsSpec;
use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use std::collections::BTreeMap;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap()
}

fn daily(n: usize) -> Vec<DateTime<Utc>> {
    (0..n).map(|i| start() + Duration::days(i as i64)).collect()
}

fn hourly(n: usize) -> Vec<DateTime<Utc>> {
    (0..n).map(|i| start() + Duration::hours(i as i64)).collect()
}

/// Weekly pattern on a slow trend.
fn signal(n: usize, level: f64) -> Vec<f64> {
    (0..n)
        .map(|i| level + 0.05 * i as f64 + 3.0 * (i as f64 * std::f64::consts::TAU / 7.0).sin())
        .collect()
}

fn frame(n: usize) -> TimeFrame {
    TimeFrame::new(daily(n)).with_target(signal(n, 20.0)).unwrap()
}

fn keyed(ids: &[&str], n: usize) -> BTreeMap<String, TimeFrame> {
    ids.iter()
        .enumerate()
        .map(|(k, id)| {
            let f = TimeFrame::new(daily(n))
                .with_target(signal(n, 10.0 * (k + 1) as f64))
                .unwrap();
            (id.to_string(), f)
        })
        .collect()
}

fn quick(n_lags: usize, n_forecasts: usize) -> ModelConfig {
    ModelConfig::new(n_lags, n_forecasts)
        .with_epochs(5)
        .with_batch_size(16)
        .with_learning_rate(0.05)
        .with_seed(42)
}

#[test]
fn second_fit_is_rejected() {
    let config = ModelConfig::new(0, 1)
        .with_epochs(1)
        .with_batch_size(10)
        .with_learning_rate(1.0)
        .with_seed(0);
    let mut model = NeuralForecaster::new(config).unwrap();
    model.fit(frame(10), None, None).unwrap();
    assert_eq!(
        model.fit(frame(10), None, None).unwrap_err(),
        ForecastError::AlreadyFitted
    );
}

#[test]
fn failed_fit_leaves_model_unfit() {
    let mut model = NeuralForecaster::new(quick(3, 1)).unwrap();
    model
        .add_future_regressor("temp", FeatureMode::Additive, NormalizeMode::Auto)
        .unwrap();
    assert_eq!(
        model.fit(frame(30), None, None).unwrap_err(),
        ForecastError::MissingColumn("temp".to_string())
    );
    assert!(!model.is_fitted());
}

#[test]
fn unknown_series_need_opt_in() {
    let mut model = NeuralForecaster::new(quick(7, 1)).unwrap();
    model.fit(keyed(&["a", "b"], 60), None, None).unwrap();
    assert_eq!(
        model.predict(keyed(&["c"], 30)).unwrap_err(),
        ForecastError::UnknownSeries("c".to_string())
    );

    let mut model =
        NeuralForecaster::new(quick(7, 1).with_unknown_data_normalization(true)).unwrap();
    model.fit(keyed(&["a", "b"], 60), None, None).unwrap();
    let forecast = model.predict(keyed(&["c"], 30)).unwrap();
    assert_eq!(forecast.shape(), InputShape::Collection);
    assert_eq!(forecast.ids(), vec!["c".to_string()]);
    assert!(forecast.rows()[29].yhat[0].unwrap().is_finite());
}

#[test]
fn lagged_regressors_need_autoregression() {
    let mut model = NeuralForecaster::new(quick(0, 1)).unwrap();
    assert!(matches!(
        model.add_lagged_regressor(&["x"], LagSpec::Auto, NormalizeMode::Auto),
        Err(ForecastError::Configuration(_))
    ));

    model
        .add_lagged_regressor(&["x"], LagSpec::Count(3), NormalizeMode::Auto)
        .unwrap();
    let data = frame(40).with_column("x", signal(40, 1.0)).unwrap();
    assert!(matches!(
        model.fit(data, None, None),
        Err(ForecastError::Configuration(_))
    ));
}

#[test]
fn seeded_fits_are_reproducible() {
    let run = |seed: u64| {
        let mut model = NeuralForecaster::new(quick(5, 2).with_seed(seed)).unwrap();
        model.fit(frame(80), None, None).unwrap();
        let forecast = model.predict(frame(80)).unwrap();
        forecast
            .rows()
            .iter()
            .flat_map(|r| r.yhat.iter().flatten().copied())
            .collect::<Vec<f64>>()
    };
    let first = run(7);
    assert!(!first.is_empty());
    assert_eq!(first, run(7));
    assert_ne!(first, run(8));
}

#[test]
fn predictions_are_in_original_units() {
    let y: Vec<f64> = (0..60).map(|i| 1000.0 + (i % 7) as f64).collect();
    let data = TimeFrame::new(daily(60)).with_target(y).unwrap();
    let mut model = NeuralForecaster::new(quick(7, 1)).unwrap();
    model.fit(data.clone(), None, None).unwrap();

    let forecast = model.predict(data).unwrap();
    let yhat: Vec<f64> = forecast.rows().iter().filter_map(|r| r.yhat[0]).collect();
    assert_eq!(yhat.len(), 53);
    assert!(yhat.iter().all(|v| (900.0..1100.0).contains(v)));
}

#[test]
fn future_dataframe_and_forecast_horizon() {
    let mut model = NeuralForecaster::new(quick(14, 7)).unwrap();
    model.fit(frame(120), None, None).unwrap();
    assert_eq!(model.frequency(), Some(Frequency::days(1)));

    let future = model.make_future_dataframe(frame(120), 7, 0, None, None).unwrap();
    assert_eq!(future.len(), 21);
    assert_eq!(future.timestamps()[20], start() + Duration::days(126));

    let forecast = model.predict(future.clone()).unwrap();
    let last = &forecast.rows()[20];
    assert!(last.y.is_none());
    assert!(last.yhat[6].is_some());

    let latest = model.latest_forecast(&forecast, None, 0).unwrap();
    assert_eq!(latest.rows.len(), 7);

    let raw = model.predict_raw(future).unwrap();
    assert_eq!(raw.len(), 1);
    assert_eq!(raw.rows()[0].steps.len(), 7);
    assert_eq!(raw.rows()[0].ds, start() + Duration::days(120));
}

#[test]
fn future_regressor_rows_must_match_periods() {
    let mut model = NeuralForecaster::new(quick(0, 1)).unwrap();
    model
        .add_future_regressor("temp", FeatureMode::Additive, NormalizeMode::Auto)
        .unwrap();
    let data = frame(60).with_column("temp", signal(60, 5.0)).unwrap();
    model.fit(data.clone(), None, None).unwrap();

    assert!(matches!(
        model.make_future_dataframe(data.clone(), 3, 0, None, None),
        Err(ForecastError::AuxiliaryMismatch(_))
    ));
    let short = RegressorTable::new().with_column("temp", vec![1.0, 2.0]).unwrap();
    assert!(matches!(
        model.make_future_dataframe(data.clone(), 3, 0, Some(&short), None),
        Err(ForecastError::AuxiliaryMismatch(_))
    ));

    let values = RegressorTable::new().with_column("temp", vec![1.0, 2.0, 3.0]).unwrap();
    let future = model.make_future_dataframe(data, 3, 0, Some(&values), None).unwrap();
    assert_eq!(future.column("temp").unwrap(), &[1.0, 2.0, 3.0]);

    let forecast = model.predict(future).unwrap();
    assert_eq!(forecast.len(), 3);
    assert!(forecast.rows().iter().all(|r| r.yhat[0].is_some()));
}

#[test]
fn events_are_flagged_and_used() {
    let mut model = NeuralForecaster::new(quick(3, 1)).unwrap();
    model
        .add_events(&["promo"], -1, 1, FeatureMode::Additive)
        .unwrap();

    let promos = EventTable::from_dates("promo", vec![daily(60)[10], daily(60)[40]]);
    let data = model.create_df_with_events(frame(60), &promos).unwrap();
    let flags = data.column("promo").unwrap();
    assert_eq!(flags.iter().sum::<f64>(), 2.0);
    assert_eq!(flags[10], 1.0);

    model.fit(data.clone(), None, None).unwrap();
    let upcoming = EventTable::from_dates("promo", vec![start() + Duration::days(60)]);
    let future = model
        .make_future_dataframe(data, 1, 0, None, Some(&upcoming))
        .unwrap();
    assert_eq!(future.column("promo").unwrap().last(), Some(&1.0));
    assert!(model.predict(future).is_ok());
}

#[test]
fn long_gaps_need_drop_missing() {
    let mut y = signal(120, 20.0);
    for v in &mut y[40..80] {
        *v = f64::NAN;
    }
    let data = TimeFrame::new(daily(120)).with_target(y).unwrap();

    let mut model = NeuralForecaster::new(quick(3, 1)).unwrap();
    assert!(matches!(
        model.fit(data.clone(), None, None),
        Err(ForecastError::MissingData { .. })
    ));

    let mut model = NeuralForecaster::new(quick(3, 1).with_drop_missing(true)).unwrap();
    model.fit(data, None, None).unwrap();
    assert!(model.is_fitted());
}

#[test]
fn prediction_frequency_selects_origins() {
    let rule = PredictionFrequency {
        daily_hour: Some(0),
        ..Default::default()
    };
    let y: Vec<f64> = (0..240)
        .map(|i| 5.0 + (i as f64 * std::f64::consts::TAU / 24.0).sin())
        .collect();
    let data = TimeFrame::new(hourly(240)).with_target(y).unwrap();

    let mut model =
        NeuralForecaster::new(quick(24, 24).with_prediction_frequency(rule)).unwrap();
    model.fit(data.clone(), None, None).unwrap();

    let raw = model.predict_raw(data).unwrap();
    assert_eq!(raw.len(), 8);
    // the origin is the last lag row, one hour before the first target
    assert!(raw.rows().iter().all(|r| r.ds.hour() == 1));
}

#[test]
fn lag_free_weekly_forecasts_overlap() {
    let rule = PredictionFrequency {
        weekly_day: Some(4),
        ..Default::default()
    };
    let mut model =
        NeuralForecaster::new(quick(0, 14).with_prediction_frequency(rule)).unwrap();
    model.fit(frame(200), None, None).unwrap();

    let raw = model.predict_raw(frame(200)).unwrap();
    // Friday origins from 2022-01-07 while 14 rows remain
    assert_eq!(raw.len(), 26);
    for row in raw.rows() {
        assert_eq!(row.steps.len(), 14);
        assert_eq!(row.ds.weekday().num_days_from_monday(), 5);
    }

    let forecast = model.predict(frame(200)).unwrap();
    let row = &forecast.rows()[14];
    assert!(row.yhat[0].is_some());
    assert!(row.yhat[7].is_some());
    assert!(forecast.rows()[3].yhat.iter().all(Option::is_none));
}

#[test]
fn regressor_tables_must_reference_known_series() {
    let mut model = NeuralForecaster::new(quick(3, 1)).unwrap();
    model
        .add_lagged_regressor(&["A"], LagSpec::Auto, NormalizeMode::Auto)
        .unwrap();
    let data = frame(60).with_column("A", signal(60, 1.0)).unwrap();
    model.fit(data.clone(), None, None).unwrap();

    let stray = RegressorTable::new()
        .with_column("A", vec![1.0])
        .unwrap()
        .with_id("dfn");
    assert!(matches!(
        model.make_future_dataframe(data.clone(), 1, 0, Some(&stray), None),
        Err(ForecastError::AuxiliaryMismatch(_))
    ));
    assert!(model.make_future_dataframe(data, 1, 0, None, None).is_ok());
}

#[test]
fn gappy_daily_data_infers_its_frequency() {
    let ds: Vec<_> = daily(150)
        .into_iter()
        .enumerate()
        .filter(|(i, _)| i % 5 != 4)
        .map(|(_, t)| t)
        .collect();
    let y = signal(ds.len(), 20.0);
    let data = TimeFrame::new(ds).with_target(y).unwrap();

    let mut model = NeuralForecaster::new(quick(3, 1)).unwrap();
    model.fit(data, None, None).unwrap();
    assert_eq!(model.frequency(), Some(Frequency::days(1)));
}

#[test]
fn metrics_follow_the_requested_list() {
    let metrics = MetricsSpec::List(vec!["MAE".to_string(), "MSE".to_string()]);
    let mut model = NeuralForecaster::new(quick(7, 1).with_metrics(metrics)).unwrap();
    let table = model
        .fit(frame(70), None, Some(frame(30).into()))
        .unwrap()
        .unwrap();
    assert_eq!(table.len(), 5);
    assert_eq!(
        table.columns(),
        &["Loss", "MAE", "MSE", "Loss_val", "MAE_val", "MSE_val"]
    );
    assert_eq!(model.metrics(), Some(&table));

    let scores = model.test(frame(30)).unwrap();
    assert_eq!(scores.len(), 1);
    assert!(scores.column("MAE").unwrap()[0].is_finite());

    let mut silent =
        NeuralForecaster::new(quick(7, 1).with_metrics(MetricsSpec::Disabled)).unwrap();
    assert!(silent.fit(frame(70), None, None).unwrap().is_none());
}

#[test]
fn split_keeps_lag_overlap() {
    let model = NeuralForecaster::new(quick(5, 1)).unwrap();
    let (train, val) = model
        .split_df(frame(100), None, ValidSize::Fraction(0.2), false)
        .unwrap();
    assert_eq!(train.len(), 81);
    assert_eq!(val.len(), 24);
    assert_eq!(val.timestamps()[0], train.timestamps()[76]);
}

#[test]
fn shared_split_threshold_across_series() {
    let mut data = keyed(&["a"], 100);
    data.insert(
        "b".to_string(),
        TimeFrame::new(daily(50)).with_target(signal(50, 1.0)).unwrap(),
    );
    let model = NeuralForecaster::new(quick(0, 1)).unwrap();
    let (train, val) = model
        .split_df(data, None, ValidSize::Fraction(0.3), false)
        .unwrap();
    assert!(train.has_ids());
    // series b ends before the threshold and stays in training
    assert_eq!(val.distinct_ids(), vec!["a".to_string()]);
    assert_eq!(train.for_id("b").len(), 50);
}

#[test]
fn crossvalidation_folds_grow_forward() {
    let model = NeuralForecaster::new(quick(5, 1)).unwrap();
    let folds = model
        .crossvalidation_split_df(frame(100), None, FoldConfig::new(5, 0.1), GlobalCvType::Local)
        .unwrap();
    let train: Vec<usize> = folds.iter().map(|(t, _)| t.len()).collect();
    let val: Vec<usize> = folds.iter().map(|(_, v)| v.len()).collect();
    assert_eq!(train, vec![55, 64, 73, 82, 91]);
    assert_eq!(val, vec![14; 5]);

    let folds = model
        .crossvalidation_split_df(
            keyed(&["a", "b"], 100),
            None,
            FoldConfig::default(),
            GlobalCvType::GlobalTime,
        )
        .unwrap();
    assert_eq!(folds.len(), 5);
    for (train, val) in &folds {
        assert_eq!(train.distinct_ids(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(val.distinct_ids(), vec!["a".to_string(), "b".to_string()]);
    }
}

#[test]
fn overlapping_folds_step_by_half_a_fold() {
    let model = NeuralForecaster::new(quick(0, 1)).unwrap();
    let folds = model
        .crossvalidation_split_df(
            frame(100),
            None,
            FoldConfig::new(5, 0.1).with_overlap(0.5),
            GlobalCvType::Local,
        )
        .unwrap();
    let train: Vec<usize> = folds.iter().map(|(t, _)| t.len()).collect();
    assert_eq!(train, vec![70, 75, 80, 85, 90]);
    assert!(folds.iter().all(|(_, v)| v.len() == 10));
}

#[test]
fn unfolding_rejects_a_different_fold_count() {
    let series = Series::univariate("a", daily(100), signal(100, 1.0)).unwrap();
    let folds = crossvalidation_split_series(&series, 0, 1, FoldConfig::default()).unwrap();
    assert_eq!(folds.len(), 5);
    let mut by_id = BTreeMap::new();
    by_id.insert("a".to_string(), folds);
    assert_eq!(
        unfold_dict_of_folds(by_id, 3).unwrap_err(),
        ForecastError::FoldCountMismatch {
            expected: 3,
            got: 5
        }
    );
}

#[test]
fn unfolding_needs_equal_fold_counts() {
    let series = |id: &str| Series::univariate(id, daily(10), vec![1.0; 10]).unwrap();
    let mut folds = BTreeMap::new();
    folds.insert("a".to_string(), vec![(series("a"), series("a")); 2]);
    folds.insert("b".to_string(), vec![(series("b"), series("b"))]);
    assert_eq!(
        unfold_dict_of_folds(folds, 2).unwrap_err(),
        ForecastError::FoldCountMismatch {
            expected: 2,
            got: 1
        }
    );
}

#[test]
fn config_round_trips_through_json() {
    let config = ModelConfig::from_json(r#"{"n_lags": 4, "n_forecasts": 2, "seed": 3}"#).unwrap();
    assert_eq!((config.n_lags, config.n_forecasts, config.seed), (4, 2, Some(3)));
    assert!(matches!(
        ModelConfig::from_json("{"),
        Err(ForecastError::Configuration(_))
    ));
    assert!(matches!(
        NeuralForecaster::new(ModelConfig::new(0, 0)),
        Err(ForecastError::Configuration(_))
    ));
}

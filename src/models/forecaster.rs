//! The user-facing forecaster.
//!
//! A [`NeuralForecaster`] collects registrations (regressors, events, custom
//! seasonalities) while unfit, is fitted exactly once, and afterwards predicts
//! with the normalization parameters and network fixed at fit time.

use crate::core::{
    check_dataframe, validate_column_name, CheckOptions, EventTable, ForecastTable, Frequency,
    InputShape, LatestForecast, RawForecast, RegressorTable, Series, SeriesCollection,
    SeriesInput, SeriesPredictions, TimeFrame, TARGET_COLUMN,
};
use crate::data::{
    check_event_ids, check_known_ids, check_regressor_ids, check_regressor_table,
    check_validation_ids, crossvalidation_split_collection, handle_missing, prep_input,
    regularize, restore_shape, split_collection, FoldConfig, GlobalCvType, ImputeColumns,
    LaggedCovariate, NormOptions, NormalizationParams, NormalizeMode, ValidSize, Window,
    WindowConfig, WindowMode, WindowSet,
};
use crate::error::{ForecastError, Result};
use crate::features::{
    create_df_with_events, resolve_seasonalities, EventSpec, FeatureMode, SeasonalityComponent,
};
use crate::models::config::{
    Components, FutureRegressorSpec, GlobalLocal, LagSpec, LaggedRegressorSpec, ModelConfig,
};
use crate::models::trainer::{SampleSet, TrainConfig, Trainer};
use crate::models::traits::{Batch, BoxedNet, NetShape, NetSpec};
use crate::utils::{MetricsSpec, MetricsTable};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Share of spacings that must agree when inferring a frequency.
const INFER_TOLERANCE: f64 = 0.7;

/// State fixed at fit time.
struct FittedModel {
    frequency: Frequency,
    ids: Vec<String>,
    norm: NormalizationParams,
    windows: WindowConfig,
    net: BoxedNet,
    metrics: Option<MetricsTable>,
}

enum ModelState {
    Unfit,
    Fit(Box<FittedModel>),
}

/// Predictions of one series in original units.
struct SeriesOutput {
    series: Series,
    starts: Vec<usize>,
    values: Vec<Vec<Vec<f64>>>,
}

/// Forecaster combining trend, seasonality, autoregression, regressors and events.
///
/// # Example
///
/// ```
/// use anofox_neural::core::TimeFrame;
/// use anofox_neural::models::{ModelConfig, NeuralForecaster};
/// use chrono::{Duration, TimeZone, Utc};
///
/// let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let ds = (0..60).map(|i| start + Duration::days(i)).collect();
/// let y = (0..60).map(|i| (i as f64 * 0.3).sin() + i as f64 * 0.1).collect();
/// let frame = TimeFrame::new(ds).with_target(y).unwrap();
///
/// let config = ModelConfig::new(7, 3).with_epochs(5).with_seed(1);
/// let mut model = NeuralForecaster::new(config).unwrap();
/// model.fit(frame.clone(), None, None).unwrap();
///
/// let future = model.make_future_dataframe(frame, 3, 0, None, None).unwrap();
/// let forecast = model.predict(future).unwrap();
/// assert_eq!(forecast.len(), 10);
/// ```
pub struct NeuralForecaster {
    config: ModelConfig,
    components: Components,
    net_spec: NetSpec,
    state: ModelState,
}

impl std::fmt::Debug for NeuralForecaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NeuralForecaster")
            .field("config", &self.config)
            .field("components", &self.components)
            .field("net", &self.net_spec)
            .field("fitted", &self.is_fitted())
            .finish()
    }
}

impl NeuralForecaster {
    pub fn new(config: ModelConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            components: Components::default(),
            net_spec: NetSpec::default(),
            state: ModelState::Unfit,
        })
    }

    /// Use a custom network instead of the linear one.
    pub fn with_net(mut self, spec: NetSpec) -> Self {
        self.net_spec = spec;
        self
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn components(&self) -> &Components {
        &self.components
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self.state, ModelState::Fit(_))
    }

    /// Frequency fixed at fit time.
    pub fn frequency(&self) -> Option<Frequency> {
        self.fitted().ok().map(|f| f.frequency)
    }

    /// Metrics recorded during fit.
    pub fn metrics(&self) -> Option<&MetricsTable> {
        self.fitted().ok().and_then(|f| f.metrics.as_ref())
    }

    fn fitted(&self) -> Result<&FittedModel> {
        match &self.state {
            ModelState::Fit(f) => Ok(f),
            ModelState::Unfit => Err(ForecastError::FitRequired),
        }
    }

    fn ensure_unfit(&self) -> Result<()> {
        if self.is_fitted() {
            return Err(ForecastError::AlreadyFitted);
        }
        Ok(())
    }

    fn max_lags(&self) -> usize {
        self.components
            .lagged
            .iter()
            .map(|r| r.n_lags)
            .fold(self.config.n_lags, usize::max)
    }

    /// Register covariates fed through their own lags.
    pub fn add_lagged_regressor(
        &mut self,
        names: &[&str],
        lags: LagSpec,
        normalize: NormalizeMode,
    ) -> Result<&mut Self> {
        self.ensure_unfit()?;
        let n_lags = lags.resolve(self.config.n_lags);
        if n_lags == 0 {
            return Err(ForecastError::Configuration(format!(
                "lagged regressors {names:?} need at least one lag"
            )));
        }
        for name in names {
            validate_column_name(name, &self.components.names())?;
            self.components.lagged.push(LaggedRegressorSpec {
                name: name.to_string(),
                n_lags,
                normalize,
            });
        }
        Ok(self)
    }

    /// Register a regressor whose future values are known.
    pub fn add_future_regressor(
        &mut self,
        name: &str,
        mode: FeatureMode,
        normalize: NormalizeMode,
    ) -> Result<&mut Self> {
        self.ensure_unfit()?;
        validate_column_name(name, &self.components.names())?;
        self.components.future.push(FutureRegressorSpec {
            name: name.to_string(),
            mode,
            normalize,
        });
        Ok(self)
    }

    /// Register events affecting `lower_window..=upper_window` rows around each occurrence.
    pub fn add_events(
        &mut self,
        names: &[&str],
        lower_window: i64,
        upper_window: i64,
        mode: FeatureMode,
    ) -> Result<&mut Self> {
        self.ensure_unfit()?;
        for name in names {
            validate_column_name(name, &self.components.names())?;
            let spec = EventSpec::new(*name)
                .with_window(lower_window, upper_window)?
                .with_mode(mode);
            self.components.events.push(spec);
        }
        Ok(self)
    }

    /// Register a custom seasonality, optionally gated by a condition column.
    ///
    /// A custom seasonality named like a built-in one replaces it.
    pub fn add_seasonality(
        &mut self,
        name: &str,
        period: f64,
        fourier_order: usize,
        condition: Option<&str>,
    ) -> Result<&mut Self> {
        self.ensure_unfit()?;
        validate_column_name(name, &self.components.names())?;
        let mut component = SeasonalityComponent::new(name, period, fourier_order)?;
        if let Some(column) = condition {
            validate_column_name(column, &self.components.names())?;
            component = component.with_condition(column);
        }
        self.components.seasonalities.push(component);
        Ok(self)
    }

    /// Validate caller input into one series per identifier.
    fn load(&self, input: SeriesInput, future: bool) -> Result<(SeriesCollection, InputShape)> {
        let (frame, shape) = prep_input(input)?;
        let mut registered = self.components.input_columns();
        registered.extend(self.components.condition_columns());
        let collection = check_dataframe(
            &frame,
            CheckOptions {
                require_target: true,
                future,
                registered: &registered,
            },
        )?;
        Ok((collection, shape))
    }

    /// Regularize and impute every series.
    ///
    /// When predicting, trailing rows without a target are future rows and
    /// stay out of imputation.
    fn clean(
        &self,
        collection: &SeriesCollection,
        frequency: Frequency,
        predicting: bool,
    ) -> Result<SeriesCollection> {
        let regressors: Vec<String> = self
            .components
            .lagged
            .iter()
            .map(|r| r.name.clone())
            .chain(self.components.future_names())
            .collect();
        let events = self.components.event_names();
        let columns = ImputeColumns {
            regressors: &regressors,
            events: &events,
        };
        collection.try_map(|s| {
            let s = regularize(s, frequency)?;
            let future_rows = if predicting { trailing_missing(s.target()) } else { 0 };
            handle_missing(&s, columns, &self.config.impute, self.config.n_lags, future_rows)
        })
    }

    fn normalize_modes(&self) -> BTreeMap<String, NormalizeMode> {
        let mut modes = BTreeMap::new();
        modes.insert(TARGET_COLUMN.to_string(), self.config.normalize);
        for r in &self.components.lagged {
            modes.insert(r.name.clone(), r.normalize);
        }
        for r in &self.components.future {
            modes.insert(r.name.clone(), r.normalize);
        }
        modes
    }

    fn norm_options(&self) -> NormOptions {
        NormOptions {
            global_normalization: self.config.global_normalization,
            global_time_normalization: self.config.global_time_normalization,
            unknown_data_normalization: self.config.unknown_data_normalization,
        }
    }

    fn window_config(&self, seasonalities: Vec<SeasonalityComponent>) -> WindowConfig {
        WindowConfig {
            n_lags: self.config.n_lags,
            n_forecasts: self.config.n_forecasts,
            lagged: self
                .components
                .lagged
                .iter()
                .map(|r| LaggedCovariate {
                    name: r.name.clone(),
                    n_lags: r.n_lags,
                })
                .collect(),
            future_regressors: self.components.future_names(),
            events: self.components.events.clone(),
            seasonalities,
            prediction_frequency: self.config.prediction_frequency,
        }
    }

    fn net_shape(&self, windows: &WindowConfig, n_series: usize, seed: u64) -> NetShape {
        let changepoints = (1..=self.config.n_changepoints)
            .map(|j| self.config.changepoints_range * j as f64 / (self.config.n_changepoints + 1) as f64)
            .collect();
        let mut quantiles = vec![0.5];
        quantiles.extend(&self.config.quantiles);
        NetShape {
            n_lags: windows.n_lags,
            n_forecasts: windows.n_forecasts,
            covariate_lags: windows.lagged.iter().map(|c| c.n_lags).collect(),
            regressor_modes: self.components.future.iter().map(|r| r.mode).collect(),
            event_modes: windows
                .events
                .iter()
                .flat_map(|e| std::iter::repeat(e.mode).take(e.feature_names().len()))
                .collect(),
            seasonal_widths: windows.seasonalities.iter().map(SeasonalityComponent::width).collect(),
            seasonality_mode: self.config.seasonality_mode,
            growth: self.config.growth,
            changepoints,
            n_series,
            trend_local: self.config.trend_global_local == GlobalLocal::Local,
            season_local: self.config.season_global_local == GlobalLocal::Local,
            quantiles,
            loss: self.config.loss,
            seed,
        }
    }

    /// Fit the model once.
    ///
    /// Returns the per-epoch metrics unless metric collection is disabled. A
    /// failed fit leaves the model unfit.
    pub fn fit(
        &mut self,
        data: impl Into<SeriesInput>,
        frequency: Option<Frequency>,
        validation: Option<SeriesInput>,
    ) -> Result<Option<MetricsTable>> {
        self.ensure_unfit()?;
        self.config.validate()?;

        let (raw, _) = self.load(data.into(), false)?;
        let frequency = match frequency {
            Some(f) => f,
            None => infer_frequency(&raw)?,
        };
        info!(series = raw.len(), rows = raw.total_rows(), %frequency, "fitting");

        let cleaned = self.clean(&raw, frequency, false)?;
        let norm = NormalizationParams::fit(&cleaned, &self.normalize_modes(), self.norm_options())?;
        let normalized = cleaned.try_map(|s| norm.apply(s))?;

        let (first, last) = time_span(&cleaned)?;
        let mut seasonalities = resolve_seasonalities(self.config.seasonality, first, last, frequency);
        seasonalities.retain(|b| !self.components.seasonalities.iter().any(|c| c.name == b.name));
        seasonalities.extend(self.components.seasonalities.iter().cloned());
        debug!(
            seasonalities = ?seasonalities.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            "resolved seasonalities"
        );

        let windows = self.window_config(seasonalities);
        windows.validate()?;

        let ids: Vec<String> = normalized.ids().map(str::to_string).collect();
        let train = collect_samples(&normalized, &windows, &norm, &ids)?;
        if train.is_empty() {
            return Err(ForecastError::InsufficientData {
                needed: windows.max_lags() + windows.n_forecasts,
                got: normalized.iter().map(Series::len).max().unwrap_or(0),
            });
        }

        let val = match validation {
            Some(input) => {
                let (raw_val, _) = self.load(input, false)?;
                if !norm.allows_unknown() {
                    check_validation_ids(&raw, &raw_val)?;
                }
                let cleaned_val = self.clean(&raw_val, frequency, false)?;
                let normalized_val = cleaned_val.try_map(|s| norm.apply(s))?;
                Some(collect_samples(&normalized_val, &windows, &norm, &ids)?)
            }
            None => None,
        };

        let seed = self.config.seed.unwrap_or_else(rand::random);
        let mut net = self.net_spec.create(&self.net_shape(&windows, ids.len(), seed))?;
        let train_config = TrainConfig::auto(
            train.len(),
            self.config.epochs,
            self.config.batch_size,
            self.config.learning_rate,
            seed,
        );
        let mut trainer = Trainer::new(train_config, self.config.loss);
        if self.config.collect_metrics.is_enabled() {
            trainer = trainer.with_metrics(self.config.collect_metrics.resolve()?);
        }
        let metrics = trainer.fit(net.as_mut(), &train, val.as_ref())?;

        self.state = ModelState::Fit(Box::new(FittedModel {
            frequency,
            ids,
            norm,
            windows,
            net,
            metrics: metrics.clone(),
        }));
        Ok(metrics)
    }

    /// Run the network over every predictable window of `input`.
    fn run(&self, input: SeriesInput) -> Result<(InputShape, Vec<SeriesOutput>)> {
        let fitted = self.fitted()?;
        let (raw, shape) = self.load(input, true)?;
        if !fitted.norm.allows_unknown() {
            let known: BTreeSet<String> = fitted.ids.iter().cloned().collect();
            check_known_ids(raw.ids(), &known)?;
        }
        let cleaned = self.clean(&raw, fitted.frequency, true)?;

        let mut outputs = Vec::with_capacity(cleaned.len());
        for series in cleaned.iter() {
            let normalized = fitted.norm.apply(series)?;
            let set = WindowSet::new(&normalized, &fitted.windows, WindowMode::Predict)?;
            let windows: Vec<Window> = set.iter().collect();
            let groups = vec![fitted.ids.iter().position(|id| id == series.id()); windows.len()];
            let scale = fitted.norm.target(series.id())?;
            let values = fitted
                .net
                .forward(&Batch::new(&windows, &groups))
                .into_iter()
                .map(|w| {
                    w.into_iter()
                        .map(|q| q.into_iter().map(|v| scale.invert(v)).collect())
                        .collect()
                })
                .collect();
            debug!(series = series.id(), windows = windows.len(), "predicted");
            outputs.push(SeriesOutput {
                series: series.clone(),
                starts: set.target_starts().to_vec(),
                values,
            });
        }
        Ok((shape, outputs))
    }

    /// Forecast table with one `yhat<k>` column per horizon step.
    pub fn predict(&self, data: impl Into<SeriesInput>) -> Result<ForecastTable> {
        let (shape, outputs) = self.run(data.into())?;
        let mut table = ForecastTable::new(self.config.n_forecasts, self.config.quantiles.clone(), shape);
        for o in &outputs {
            table.push_series(predictions(o))?;
        }
        Ok(table)
    }

    /// One row per forecast origin with `step<k>` columns.
    pub fn predict_raw(&self, data: impl Into<SeriesInput>) -> Result<RawForecast> {
        let (_, outputs) = self.run(data.into())?;
        let mut raw = RawForecast::new(self.config.n_forecasts, self.config.quantiles.clone());
        for o in &outputs {
            raw.push_series(predictions(o))?;
        }
        Ok(raw)
    }

    /// Loss and metrics of the fitted model on held-out data.
    pub fn test(&self, data: impl Into<SeriesInput>) -> Result<MetricsTable> {
        let fitted = self.fitted()?;
        let (raw, _) = self.load(data.into(), false)?;
        if !fitted.norm.allows_unknown() {
            let known: BTreeSet<String> = fitted.ids.iter().cloned().collect();
            check_known_ids(raw.ids(), &known)?;
        }
        let cleaned = self.clean(&raw, fitted.frequency, false)?;
        let normalized = cleaned.try_map(|s| fitted.norm.apply(s))?;
        let samples = collect_samples(&normalized, &fitted.windows, &fitted.norm, &fitted.ids)?;
        if samples.is_empty() {
            return Err(ForecastError::InsufficientData {
                needed: fitted.windows.max_lags() + fitted.windows.n_forecasts,
                got: normalized.iter().map(Series::len).max().unwrap_or(0),
            });
        }

        let metrics = match &self.config.collect_metrics {
            MetricsSpec::Disabled => MetricsSpec::Default.resolve()?,
            spec => spec.resolve()?,
        };
        let trainer = Trainer::new(TrainConfig::auto(samples.len(), Some(1), None, None, 0), self.config.loss)
            .with_metrics(metrics.clone());
        let mut table = MetricsTable::new(&metrics, false);
        table.push(trainer.evaluate(fitted.net.as_ref(), &samples))?;
        Ok(table)
    }

    /// Most recent forecast of each origin, for one series.
    pub fn latest_forecast(
        &self,
        forecast: &ForecastTable,
        series: Option<&str>,
        include_previous: usize,
    ) -> Result<LatestForecast> {
        forecast.latest_forecast(series, include_previous)
    }

    fn prepare_for_split(
        &self,
        data: SeriesInput,
        frequency: Option<Frequency>,
    ) -> Result<(SeriesCollection, InputShape)> {
        let (raw, shape) = self.load(data, false)?;
        let frequency = match (self.frequency(), frequency) {
            (Some(f), _) | (None, Some(f)) => f,
            (None, None) => infer_frequency(&raw)?,
        };
        Ok((self.clean(&raw, frequency, false)?, shape))
    }

    /// Split chronologically into training and validation frames.
    pub fn split_df(
        &self,
        data: impl Into<SeriesInput>,
        frequency: Option<Frequency>,
        valid: ValidSize,
        local_split: bool,
    ) -> Result<(TimeFrame, TimeFrame)> {
        let (collection, shape) = self.prepare_for_split(data.into(), frequency)?;
        let fold = split_collection(
            &collection,
            self.max_lags(),
            self.config.n_forecasts,
            valid,
            local_split,
        )?;
        Ok((
            restore_shape(fold.train.to_frame()?, shape),
            restore_shape(fold.val.to_frame()?, shape),
        ))
    }

    /// Cross-validation folds as (train, validation) frames, oldest first.
    pub fn crossvalidation_split_df(
        &self,
        data: impl Into<SeriesInput>,
        frequency: Option<Frequency>,
        folds: FoldConfig,
        cv_type: GlobalCvType,
    ) -> Result<Vec<(TimeFrame, TimeFrame)>> {
        let (collection, shape) = self.prepare_for_split(data.into(), frequency)?;
        crossvalidation_split_collection(
            &collection,
            self.max_lags(),
            self.config.n_forecasts,
            folds,
            cv_type,
        )?
        .into_iter()
        .map(|f| {
            Ok((
                restore_shape(f.train.to_frame()?, shape),
                restore_shape(f.val.to_frame()?, shape),
            ))
        })
        .collect()
    }

    /// Add registered event columns to `data`.
    pub fn create_df_with_events(
        &self,
        data: impl Into<SeriesInput>,
        events: &EventTable,
    ) -> Result<TimeFrame> {
        let (frame, shape) = prep_input(data.into())?;
        let out = create_df_with_events(&frame, events, &self.components.events)?;
        Ok(restore_shape(out, shape))
    }

    /// Extend `data` with `periods` future rows ready for [`predict`](Self::predict).
    ///
    /// Keeps the history the lags need plus `n_historic_predictions` rows.
    /// With lags, `periods` is capped at `n_forecasts`. Future regressor values
    /// come from `regressors`, one row per period and series.
    pub fn make_future_dataframe(
        &self,
        data: impl Into<SeriesInput>,
        periods: usize,
        n_historic_predictions: usize,
        regressors: Option<&RegressorTable>,
        events: Option<&EventTable>,
    ) -> Result<TimeFrame> {
        let fitted = self.fitted()?;
        let (raw, shape) = self.load(data.into(), true)?;
        let ids: BTreeSet<String> = raw.ids().map(str::to_string).collect();
        if !fitted.norm.allows_unknown() {
            let known: BTreeSet<String> = fitted.ids.iter().cloned().collect();
            check_known_ids(ids.iter().map(String::as_str), &known)?;
        }

        let max_lags = fitted.windows.max_lags();
        let mut periods = periods;
        if max_lags > 0 && periods > self.config.n_forecasts {
            warn!(
                periods,
                n_forecasts = self.config.n_forecasts,
                "capping future periods at the forecast horizon"
            );
            periods = self.config.n_forecasts;
        }

        if let Some(table) = regressors {
            check_regressor_ids(table, &ids)?;
        }
        let future_names = self.components.future_names();
        if periods > 0 && !future_names.is_empty() {
            let table = regressors.ok_or_else(|| {
                ForecastError::AuxiliaryMismatch(
                    "future values of the registered regressors are required".to_string(),
                )
            })?;
            check_regressor_table(table, &future_names, &ids, periods)?;
        }
        if let Some(events) = events {
            check_event_ids(events, &ids)?;
        }

        let mut frames = Vec::with_capacity(raw.len());
        for series in raw.iter() {
            let series = regularize(series, fitted.frequency)?;
            if series.len() < max_lags {
                return Err(ForecastError::InsufficientData {
                    needed: max_lags,
                    got: series.len(),
                });
            }
            let keep = max_lags.saturating_add(n_historic_predictions).min(series.len());
            let history = series.slice(series.len() - keep, series.len())?;
            let mut frame = history.to_frame()?;

            if periods > 0 {
                let last = series.last_timestamp().ok_or(ForecastError::EmptyData)?;
                let ds = (1..=periods)
                    .map(|k| fitted.frequency.advance(last, k as i64))
                    .collect::<Result<Vec<DateTime<Utc>>>>()?;
                let known = regressors.map(|t| t.for_id(series.id())).unwrap_or_default();
                let mut future = TimeFrame::new(ds).with_id(series.id());
                let names: Vec<String> = frame.column_names().map(str::to_string).collect();
                for name in names {
                    let values = match known.get(&name) {
                        Some(v) if future_names.contains(&name) => v.clone(),
                        _ if self.components.events.iter().any(|e| e.name == name) => vec![0.0; periods],
                        _ => vec![f64::NAN; periods],
                    };
                    future.set_column(name, values)?;
                }
                frame = TimeFrame::concat(&[frame, future])?;
            }
            frames.push(frame);
        }

        let mut merged = TimeFrame::concat(&frames)?;
        if let Some(events) = events {
            merged = create_df_with_events(&merged, events, &self.components.events)?;
        }
        Ok(restore_shape(merged, shape))
    }
}

fn predictions(o: &SeriesOutput) -> SeriesPredictions<'_> {
    SeriesPredictions {
        id: o.series.id(),
        timestamps: o.series.timestamps(),
        actuals: o.series.target(),
        target_starts: &o.starts,
        values: &o.values,
    }
}

/// Length of the run of missing values at the end of `values`.
fn trailing_missing(values: &[f64]) -> usize {
    values.iter().rev().take_while(|v| v.is_nan()).count()
}

/// Infer one frequency shared by every series.
fn infer_frequency(collection: &SeriesCollection) -> Result<Frequency> {
    let mut found: Option<Frequency> = None;
    for s in collection.iter().filter(|s| s.len() >= 2) {
        let f = Frequency::infer(s.timestamps(), INFER_TOLERANCE)?;
        match found {
            Some(prev) if prev != f => {
                return Err(ForecastError::FrequencyInference(format!(
                    "series disagree on frequency: {prev} and {f}"
                )))
            }
            _ => found = Some(f),
        }
    }
    found.ok_or_else(|| {
        ForecastError::FrequencyInference("every series has fewer than two rows".to_string())
    })
}

fn time_span(collection: &SeriesCollection) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let first = collection.iter().filter_map(Series::first_timestamp).min();
    let last = collection.iter().filter_map(Series::last_timestamp).max();
    first.zip(last).ok_or(ForecastError::EmptyData)
}

/// Training windows of every series, tagged with their fit-time index.
fn collect_samples(
    collection: &SeriesCollection,
    windows: &WindowConfig,
    norm: &NormalizationParams,
    ids: &[String],
) -> Result<SampleSet> {
    let mut samples = SampleSet::new();
    for series in collection.iter() {
        let set = WindowSet::new(series, windows, WindowMode::Train)?;
        let group = ids.iter().position(|id| id == series.id());
        samples.extend(set.iter(), group, norm.target(series.id())?);
    }
    Ok(samples)
}

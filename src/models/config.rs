//! Model configuration and component registries.

use crate::data::{ImputeConfig, NormalizeMode, PredictionFrequency};
use crate::error::{ForecastError, Result};
use crate::features::{BuiltinSeasonality, EventSpec, FeatureMode, SeasonalityComponent, SeasonalityToggle};
use crate::utils::MetricsSpec;
use serde::{Deserialize, Serialize};

/// Trend shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrowthMode {
    /// No trend component.
    Off,
    /// Piecewise linear trend with changepoints.
    #[default]
    Linear,
}

/// Whether a component's parameters are shared across series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalLocal {
    #[default]
    Global,
    /// One parameter set per series.
    Local,
}

/// Point-forecast loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LossKind {
    /// Squared below a residual of 1, absolute above.
    #[default]
    Huber,
    Mse,
    Mae,
}

impl LossKind {
    /// Loss of residual `r = prediction - target`.
    pub fn value(&self, r: f64) -> f64 {
        match self {
            Self::Huber if r.abs() <= 1.0 => 0.5 * r * r,
            Self::Huber => r.abs() - 0.5,
            Self::Mse => r * r,
            Self::Mae => r.abs(),
        }
    }

    /// Derivative of the loss with respect to the prediction.
    pub fn gradient(&self, r: f64) -> f64 {
        match self {
            Self::Huber => r.clamp(-1.0, 1.0),
            Self::Mse => 2.0 * r,
            Self::Mae => r.signum(),
        }
    }
}

/// Number of lags of a lagged regressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LagSpec {
    /// Same as the autoregression.
    #[default]
    Auto,
    /// A single lag.
    Scalar,
    Count(usize),
}

impl LagSpec {
    pub fn resolve(&self, n_lags: usize) -> usize {
        match *self {
            Self::Auto => n_lags,
            Self::Scalar => 1,
            Self::Count(n) => n,
        }
    }
}

/// Model hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Past target values fed to the autoregression.
    pub n_lags: usize,
    /// Steps forecast by each window.
    pub n_forecasts: usize,
    pub growth: GrowthMode,
    pub n_changepoints: usize,
    /// Share of the fit time span holding changepoints.
    pub changepoints_range: f64,
    #[serde(flatten)]
    pub seasonality: BuiltinSeasonality,
    pub seasonality_mode: FeatureMode,
    pub trend_global_local: GlobalLocal,
    pub season_global_local: GlobalLocal,
    pub normalize: NormalizeMode,
    pub global_normalization: bool,
    pub global_time_normalization: bool,
    pub unknown_data_normalization: bool,
    #[serde(flatten)]
    pub impute: ImputeConfig,
    pub prediction_frequency: PredictionFrequency,
    /// Extra quantiles in (0, 1); the median is always modelled.
    pub quantiles: Vec<f64>,
    /// Chosen from the data when unset.
    pub epochs: Option<usize>,
    pub batch_size: Option<usize>,
    pub learning_rate: Option<f64>,
    pub loss: LossKind,
    /// Drawn at random when unset.
    pub seed: Option<u64>,
    pub collect_metrics: MetricsSpec,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_lags: 0,
            n_forecasts: 1,
            growth: GrowthMode::Linear,
            n_changepoints: 10,
            changepoints_range: 0.8,
            seasonality: BuiltinSeasonality::default(),
            seasonality_mode: FeatureMode::Additive,
            trend_global_local: GlobalLocal::Global,
            season_global_local: GlobalLocal::Global,
            normalize: NormalizeMode::Auto,
            global_normalization: false,
            global_time_normalization: true,
            unknown_data_normalization: false,
            impute: ImputeConfig::default(),
            prediction_frequency: PredictionFrequency::default(),
            quantiles: Vec::new(),
            epochs: None,
            batch_size: None,
            learning_rate: None,
            loss: LossKind::Huber,
            seed: None,
            collect_metrics: MetricsSpec::Default,
        }
    }
}

impl ModelConfig {
    pub fn new(n_lags: usize, n_forecasts: usize) -> Self {
        Self {
            n_lags,
            n_forecasts,
            ..Default::default()
        }
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ForecastError::Configuration(format!("invalid model configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_growth(mut self, growth: GrowthMode) -> Self {
        self.growth = growth;
        self
    }

    pub fn with_changepoints(mut self, n_changepoints: usize, range: f64) -> Self {
        self.n_changepoints = n_changepoints;
        self.changepoints_range = range;
        self
    }

    pub fn with_yearly_seasonality(mut self, toggle: SeasonalityToggle) -> Self {
        self.seasonality.yearly = toggle;
        self
    }

    pub fn with_weekly_seasonality(mut self, toggle: SeasonalityToggle) -> Self {
        self.seasonality.weekly = toggle;
        self
    }

    pub fn with_daily_seasonality(mut self, toggle: SeasonalityToggle) -> Self {
        self.seasonality.daily = toggle;
        self
    }

    pub fn with_seasonality_mode(mut self, mode: FeatureMode) -> Self {
        self.seasonality_mode = mode;
        self
    }

    pub fn with_trend_global_local(mut self, scope: GlobalLocal) -> Self {
        self.trend_global_local = scope;
        self
    }

    pub fn with_season_global_local(mut self, scope: GlobalLocal) -> Self {
        self.season_global_local = scope;
        self
    }

    pub fn with_normalize(mut self, mode: NormalizeMode) -> Self {
        self.normalize = mode;
        self
    }

    pub fn with_global_normalization(mut self, global: bool) -> Self {
        self.global_normalization = global;
        self
    }

    pub fn with_global_time_normalization(mut self, global: bool) -> Self {
        self.global_time_normalization = global;
        self
    }

    pub fn with_unknown_data_normalization(mut self, allow: bool) -> Self {
        self.unknown_data_normalization = allow;
        self
    }

    pub fn with_impute(mut self, impute: ImputeConfig) -> Self {
        self.impute = impute;
        self
    }

    pub fn with_drop_missing(mut self, drop: bool) -> Self {
        self.impute.drop_missing = drop;
        self
    }

    pub fn with_prediction_frequency(mut self, rule: PredictionFrequency) -> Self {
        self.prediction_frequency = rule;
        self
    }

    pub fn with_quantiles(mut self, quantiles: Vec<f64>) -> Self {
        self.quantiles = quantiles;
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = Some(epochs);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = Some(learning_rate);
        self
    }

    pub fn with_loss(mut self, loss: LossKind) -> Self {
        self.loss = loss;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsSpec) -> Self {
        self.collect_metrics = metrics;
        self
    }

    /// Check value ranges and combinations.
    pub fn validate(&self) -> Result<()> {
        if self.n_forecasts == 0 {
            return Err(ForecastError::Configuration(
                "n_forecasts must be at least 1".to_string(),
            ));
        }
        if !(self.changepoints_range > 0.0 && self.changepoints_range <= 1.0) {
            return Err(ForecastError::Configuration(format!(
                "changepoints_range must be in (0, 1], got {}",
                self.changepoints_range
            )));
        }
        for (i, &q) in self.quantiles.iter().enumerate() {
            if !(q > 0.0 && q < 1.0) {
                return Err(ForecastError::Configuration(format!(
                    "quantile {q} must be in (0, 1)"
                )));
            }
            if (q - 0.5).abs() < f64::EPSILON || self.quantiles[..i].contains(&q) {
                return Err(ForecastError::Configuration(format!(
                    "quantile {q} is listed twice"
                )));
            }
        }
        if self.epochs == Some(0) || self.batch_size == Some(0) {
            return Err(ForecastError::Configuration(
                "epochs and batch_size must be at least 1".to_string(),
            ));
        }
        if let Some(lr) = self.learning_rate {
            if !(lr > 0.0 && lr.is_finite()) {
                return Err(ForecastError::Configuration(format!(
                    "learning_rate must be positive, got {lr}"
                )));
            }
        }
        self.collect_metrics.resolve()?;
        self.prediction_frequency.validate()
    }
}

/// A lagged regressor registered before fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaggedRegressorSpec {
    pub name: String,
    pub n_lags: usize,
    pub normalize: NormalizeMode,
}

/// A future regressor registered before fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FutureRegressorSpec {
    pub name: String,
    pub mode: FeatureMode,
    pub normalize: NormalizeMode,
}

/// Components registered before fit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Components {
    pub lagged: Vec<LaggedRegressorSpec>,
    pub future: Vec<FutureRegressorSpec>,
    pub events: Vec<EventSpec>,
    pub seasonalities: Vec<SeasonalityComponent>,
}

impl Components {
    /// Every name taken by a registered component.
    pub fn names(&self) -> Vec<String> {
        self.lagged
            .iter()
            .map(|r| r.name.clone())
            .chain(self.future.iter().map(|r| r.name.clone()))
            .chain(self.events.iter().map(|e| e.name.clone()))
            .chain(self.seasonalities.iter().map(|s| s.name.clone()))
            .collect()
    }

    /// Input columns the data must carry (regressors and events).
    pub fn input_columns(&self) -> Vec<String> {
        self.lagged
            .iter()
            .map(|r| r.name.clone())
            .chain(self.future.iter().map(|r| r.name.clone()))
            .chain(self.events.iter().map(|e| e.name.clone()))
            .collect()
    }

    pub fn future_names(&self) -> Vec<String> {
        self.future.iter().map(|r| r.name.clone()).collect()
    }

    pub fn event_names(&self) -> Vec<String> {
        self.events.iter().map(|e| e.name.clone()).collect()
    }

    /// Condition columns of conditional seasonalities.
    pub fn condition_columns(&self) -> Vec<String> {
        self.seasonalities
            .iter()
            .filter_map(|s| s.condition.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ModelConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.n_forecasts, 1);
        assert!(config.global_time_normalization);
    }

    #[test]
    fn rejects_bad_combinations() {
        assert!(ModelConfig::new(0, 14).validate().is_ok());
        assert!(matches!(
            ModelConfig::new(0, 0).validate(),
            Err(ForecastError::Configuration(_))
        ));
        assert!(ModelConfig::new(1, 0).validate().is_err());
        assert!(ModelConfig::default().with_quantiles(vec![0.5]).validate().is_err());
        assert!(ModelConfig::default().with_quantiles(vec![0.1, 0.1]).validate().is_err());
        assert!(ModelConfig::default().with_learning_rate(0.0).validate().is_err());
        assert!(ModelConfig::default().with_changepoints(5, 1.5).validate().is_err());
    }

    #[test]
    fn parses_json_with_defaults() {
        let config = ModelConfig::from_json(
            r#"{"n_lags": 3, "n_forecasts": 2, "loss": "mae", "impute_linear": 5,
                "yearly": "off", "quantiles": [0.1, 0.9]}"#,
        )
        .unwrap();
        assert_eq!(config.n_lags, 3);
        assert_eq!(config.loss, LossKind::Mae);
        assert_eq!(config.impute.impute_linear, 5);
        assert_eq!(config.seasonality.yearly, SeasonalityToggle::Off);
        assert_eq!(config.n_changepoints, 10);

        assert!(matches!(
            ModelConfig::from_json(r#"{"n_lags": "x"}"#),
            Err(ForecastError::Configuration(_))
        ));
    }

    #[test]
    fn loss_gradients() {
        assert_eq!(LossKind::Huber.value(0.5), 0.125);
        assert_eq!(LossKind::Huber.value(3.0), 2.5);
        assert_eq!(LossKind::Huber.gradient(3.0), 1.0);
        assert_eq!(LossKind::Mse.gradient(0.5), 1.0);
        assert_eq!(LossKind::Mae.gradient(-2.0), -1.0);
    }

    #[test]
    fn lag_specs() {
        assert_eq!(LagSpec::Auto.resolve(7), 7);
        assert_eq!(LagSpec::Scalar.resolve(7), 1);
        assert_eq!(LagSpec::Count(3).resolve(7), 3);
    }
}

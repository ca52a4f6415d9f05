//! Network interface and factory.

use crate::data::Window;
use crate::error::Result;
use crate::features::FeatureMode;
use crate::models::config::{GrowthMode, LossKind};

/// A batch of windows with the fit-time series index of each window.
///
/// `None` marks a series unseen at fit time; local components then use the
/// average over all fitted series.
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    pub windows: &'a [Window],
    pub groups: &'a [Option<usize>],
}

impl<'a> Batch<'a> {
    pub fn new(windows: &'a [Window], groups: &'a [Option<usize>]) -> Self {
        Self { windows, groups }
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

/// Dimensions and options a network is built for.
#[derive(Debug, Clone, PartialEq)]
pub struct NetShape {
    pub n_lags: usize,
    pub n_forecasts: usize,
    /// Lag count of each lagged regressor.
    pub covariate_lags: Vec<usize>,
    /// Mode of each future regressor.
    pub regressor_modes: Vec<FeatureMode>,
    /// Mode of each event feature.
    pub event_modes: Vec<FeatureMode>,
    /// Number of Fourier terms of each seasonality.
    pub seasonal_widths: Vec<usize>,
    pub seasonality_mode: FeatureMode,
    pub growth: GrowthMode,
    /// Changepoint positions in normalized time.
    pub changepoints: Vec<f64>,
    /// Number of series seen at fit time.
    pub n_series: usize,
    pub trend_local: bool,
    pub season_local: bool,
    /// Quantiles of the output heads; the first is the median.
    pub quantiles: Vec<f64>,
    pub loss: LossKind,
    pub seed: u64,
}

/// A trainable network mapping windows to multi-step forecasts.
///
/// This trait is object-safe and can be used with `Box<dyn TimeNet>`.
pub trait TimeNet {
    /// Predictions in normalized units, `[window][quantile][step]`.
    fn forward(&self, batch: &Batch<'_>) -> Vec<Vec<Vec<f64>>>;

    /// One optimization step; returns the batch loss before the update.
    fn train_batch(&mut self, batch: &Batch<'_>, learning_rate: f64) -> Result<f64>;

    /// Get the model name.
    fn name(&self) -> &str;
}

/// Type alias for boxed network trait objects.
pub type BoxedNet = Box<dyn TimeNet>;

/// Named network factory.
///
/// # Example
///
/// ```
/// use anofox_neural::models::{BoxedNet, LinearNet, NetSpec};
///
/// let spec = NetSpec::new("linear", |shape| Ok(Box::new(LinearNet::new(shape)?) as BoxedNet));
/// assert_eq!(spec.name, "linear");
/// ```
pub struct NetSpec {
    /// Display name of the network
    pub name: &'static str,
    factory: Box<dyn Fn(&NetShape) -> Result<BoxedNet> + Send + Sync>,
}

impl NetSpec {
    pub fn new<F>(name: &'static str, factory: F) -> Self
    where
        F: Fn(&NetShape) -> Result<BoxedNet> + Send + Sync + 'static,
    {
        Self {
            name,
            factory: Box::new(factory),
        }
    }

    /// Build a fresh network.
    pub fn create(&self, shape: &NetShape) -> Result<BoxedNet> {
        (self.factory)(shape)
    }
}

impl Default for NetSpec {
    fn default() -> Self {
        Self::new("LinearNet", |shape| {
            Ok(Box::new(crate::models::LinearNet::new(shape)?) as BoxedNet)
        })
    }
}

impl std::fmt::Debug for NetSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetSpec").field("name", &self.name).finish()
    }
}

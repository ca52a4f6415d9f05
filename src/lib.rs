//! # anofox-neural
//!
//! Neural additive time series forecasting.
//!
//! Prepares single or multiple time series for a forecasting network:
//! frequency inference, gap imputation, per-series normalization, lag and
//! horizon windowing, chronological splits and cross-validation folds. A
//! reference linear network models trend, seasonality, autoregression,
//! regressors and events, and is trained with seeded mini-batches.

// Allow some clippy warnings for cleaner code in specific cases
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![allow(clippy::needless_range_loop)]

pub mod core;
pub mod data;
pub mod error;
pub mod features;
pub mod models;
pub mod utils;

pub use error::{ForecastError, Result};

pub mod prelude {
    pub use crate::core::{EventTable, ForecastTable, Frequency, RegressorTable, TimeFrame};
    pub use crate::data::{FoldConfig, GlobalCvType, NormalizeMode, ValidSize};
    pub use crate::error::{ForecastError, Result};
    pub use crate::features::FeatureMode;
    pub use crate::models::{LagSpec, ModelConfig, NeuralForecaster, TimeNet};
    pub use crate::utils::{MetricsSpec, MetricsTable};
}

//! Utility functions: accuracy metrics and descriptive statistics.

pub mod metrics;
pub mod stats;

pub use metrics::{mae, mse, msle, rmse, smape, Metric, MetricsSpec, MetricsTable, LOSS_COLUMN, VAL_SUFFIX};
pub use stats::{is_binary, mean, median, population_std, quantile_higher, quantile_lower};

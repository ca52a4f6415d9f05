//! Accuracy metrics and the per-epoch metrics table.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Name of the training loss column.
pub const LOSS_COLUMN: &str = "Loss";
/// Suffix of validation metric columns.
pub const VAL_SUFFIX: &str = "_val";

/// Pairs where both values are finite.
fn finite_pairs<'a>(actual: &'a [f64], predicted: &'a [f64]) -> impl Iterator<Item = (f64, f64)> + 'a {
    actual
        .iter()
        .zip(predicted.iter())
        .filter(|(a, p)| a.is_finite() && p.is_finite())
        .map(|(a, p)| (*a, *p))
}

fn mean_of(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Calculate MAE between two slices, skipping missing values.
pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() {
        return f64::NAN;
    }
    mean_of(finite_pairs(actual, predicted).map(|(a, p)| (a - p).abs()))
}

/// Calculate MSE between two slices, skipping missing values.
pub fn mse(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() {
        return f64::NAN;
    }
    mean_of(finite_pairs(actual, predicted).map(|(a, p)| (a - p).powi(2)))
}

/// Calculate RMSE between two slices.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    mse(actual, predicted).sqrt()
}

/// Mean squared error of `ln(1 + x)`; values below zero are clamped to zero.
pub fn msle(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() {
        return f64::NAN;
    }
    mean_of(
        finite_pairs(actual, predicted)
            .map(|(a, p)| (a.max(0.0).ln_1p() - p.max(0.0).ln_1p()).powi(2)),
    )
}

/// Calculate SMAPE between two slices.
pub fn smape(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() {
        return f64::NAN;
    }
    100.0
        * mean_of(finite_pairs(actual, predicted).map(|(a, p)| {
            let denom = a.abs() + p.abs();
            if denom == 0.0 {
                0.0
            } else {
                2.0 * (a - p).abs() / denom
            }
        }))
}

/// A collectable accuracy metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    Mae,
    Mse,
    Rmse,
    Msle,
    Smape,
}

impl Metric {
    /// Canonical column name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mae => "MAE",
            Self::Mse => "MSE",
            Self::Rmse => "RMSE",
            Self::Msle => "MSLE",
            Self::Smape => "SMAPE",
        }
    }

    pub fn compute(&self, actual: &[f64], predicted: &[f64]) -> f64 {
        match self {
            Self::Mae => mae(actual, predicted),
            Self::Mse => mse(actual, predicted),
            Self::Rmse => rmse(actual, predicted),
            Self::Msle => msle(actual, predicted),
            Self::Smape => smape(actual, predicted),
        }
    }
}

impl FromStr for Metric {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "MAE" | "mae" | "MeanAbsoluteError" => Ok(Self::Mae),
            "MSE" | "mse" | "MeanSquaredError" => Ok(Self::Mse),
            "RMSE" | "rmse" | "RootMeanSquaredError" => Ok(Self::Rmse),
            "MSLE" | "msle" | "MeanSquaredLogError" => Ok(Self::Msle),
            "SMAPE" | "smape" | "SymmetricMeanAbsolutePercentageError" => Ok(Self::Smape),
            other => Err(ForecastError::InvalidParameter(format!(
                "unknown metric '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which metrics to collect during training.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricsSpec {
    /// MAE and RMSE.
    #[default]
    Default,
    /// No metrics; `fit` returns nothing.
    Disabled,
    /// Metrics by name or alias.
    List(Vec<String>),
    /// Column name to metric name or alias.
    Named(BTreeMap<String, String>),
}

impl MetricsSpec {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Column names and metrics to compute, in column order.
    pub fn resolve(&self) -> Result<Vec<(String, Metric)>> {
        let plain = |m: Metric| (m.name().to_string(), m);
        match self {
            Self::Default => Ok(vec![plain(Metric::Mae), plain(Metric::Rmse)]),
            Self::Disabled => Ok(Vec::new()),
            Self::List(names) => names
                .iter()
                .map(|n| n.parse().map(plain))
                .collect(),
            Self::Named(map) => map
                .iter()
                .map(|(col, n)| Ok((col.clone(), n.parse()?)))
                .collect(),
        }
    }
}

/// One row per epoch, one column per collected value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsTable {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl MetricsTable {
    /// Table with a `Loss` column, one column per metric and, if `with_val`,
    /// the same columns suffixed `_val`.
    pub fn new(metrics: &[(String, Metric)], with_val: bool) -> Self {
        let mut columns = vec![LOSS_COLUMN.to_string()];
        columns.extend(metrics.iter().map(|(c, _)| c.clone()));
        if with_val {
            let val: Vec<String> = columns.iter().map(|c| format!("{c}{VAL_SUFFIX}")).collect();
            columns.extend(val);
        }
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<f64>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.columns.len(),
                got: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Values of column `name` across epochs.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let j = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|r| r[j]).collect())
    }

    /// Value of column `name` at the last epoch.
    pub fn last(&self, name: &str) -> Option<f64> {
        let j = self.columns.iter().position(|c| c == name)?;
        self.rows.last().map(|r| r[j])
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

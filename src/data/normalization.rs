//! Shift/scale normalization of targets, covariates and time.
//!
//! Parameters are fit once, either over all series concatenated (global) or
//! per series identifier (local), and reused unchanged afterwards.

use crate::core::{Series, SeriesCollection, TARGET_COLUMN};
use crate::error::{ForecastError, Result};
use crate::utils::stats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Name of the normalized time column added by [`NormalizationParams::apply`].
pub const TIME_FEATURE: &str = "t";

/// Normalization policy of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizeMode {
    /// Shift 0, scale 1.
    Off,
    /// Shift by the minimum, scale by the range.
    MinMax,
    /// Shift by the mean, scale by the population standard deviation.
    Standardize,
    /// Shift by the minimum, scale by the 95th percentile above it.
    Soft,
    /// Shift by the 10th percentile, scale by the 10th-90th percentile range.
    Soft1,
    /// `Off` for binary columns, `Soft` otherwise.
    #[default]
    Auto,
}

impl FromStr for NormalizeMode {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "minmax" => Ok(Self::MinMax),
            "standardize" => Ok(Self::Standardize),
            "soft" => Ok(Self::Soft),
            "soft1" => Ok(Self::Soft1),
            "auto" => Ok(Self::Auto),
            other => Err(ForecastError::InvalidParameter(format!(
                "unknown normalization mode '{other}'"
            ))),
        }
    }
}

impl fmt::Display for NormalizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Off => "off",
            Self::MinMax => "minmax",
            Self::Standardize => "standardize",
            Self::Soft => "soft",
            Self::Soft1 => "soft1",
            Self::Auto => "auto",
        };
        f.write_str(name)
    }
}

/// Affine transform `(x - shift) / scale`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShiftScale {
    pub shift: f64,
    pub scale: f64,
}

impl ShiftScale {
    pub fn identity() -> Self {
        Self {
            shift: 0.0,
            scale: 1.0,
        }
    }

    /// Compute parameters for `values` under `mode`; NaN entries are ignored.
    pub fn fit(values: &[f64], mode: NormalizeMode) -> Self {
        let mode = match mode {
            NormalizeMode::Auto if stats::is_binary(values) => NormalizeMode::Off,
            NormalizeMode::Auto => NormalizeMode::Soft,
            other => other,
        };
        if mode == NormalizeMode::Off || values.iter().all(|v| v.is_nan()) {
            return Self::identity();
        }

        let (min, max) = (stats::min(values), stats::max(values));
        let (shift, scale) = match mode {
            NormalizeMode::MinMax => (min, max - min),
            NormalizeMode::Standardize => (stats::mean(values), stats::population_std(values)),
            NormalizeMode::Soft => {
                let scale = stats::quantile_higher(values, 0.95) - min;
                (min, if scale == 0.0 { max - min } else { scale })
            }
            NormalizeMode::Soft1 => {
                let q10 = stats::quantile_lower(values, 0.1);
                let scale = stats::quantile_higher(values, 0.9) - q10;
                (q10, if scale == 0.0 { (max - min) / 2.0 } else { scale })
            }
            NormalizeMode::Off | NormalizeMode::Auto => (0.0, 1.0),
        };
        let scale = if scale.abs() < f64::EPSILON || !scale.is_finite() {
            1.0
        } else {
            scale
        };
        Self { shift, scale }
    }

    pub fn apply(&self, x: f64) -> f64 {
        (x - self.shift) / self.scale
    }

    pub fn invert(&self, x: f64) -> f64 {
        x * self.scale + self.shift
    }
}

/// Time normalization: `t = (ds - start) / span`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeScale {
    pub start: DateTime<Utc>,
    /// Span in seconds (1 if the fit data covers a single instant).
    pub span: f64,
}

impl TimeScale {
    pub fn fit(first: DateTime<Utc>, last: DateTime<Utc>) -> Self {
        let span = (last - first).num_seconds() as f64;
        Self {
            start: first,
            span: if span > 0.0 { span } else { 1.0 },
        }
    }

    pub fn apply(&self, ts: &DateTime<Utc>) -> f64 {
        (*ts - self.start).num_seconds() as f64 / self.span
    }
}

/// Parameters of one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleParams {
    pub time: TimeScale,
    pub columns: BTreeMap<String, ShiftScale>,
}

impl ScaleParams {
    fn fit<'a>(
        series: impl Iterator<Item = &'a Series> + Clone,
        modes: &BTreeMap<String, NormalizeMode>,
    ) -> Result<Self> {
        let first = series
            .clone()
            .filter_map(Series::first_timestamp)
            .min()
            .ok_or(ForecastError::EmptyData)?;
        let last = series
            .clone()
            .filter_map(Series::last_timestamp)
            .max()
            .ok_or(ForecastError::EmptyData)?;

        let mut columns = BTreeMap::new();
        for (name, &mode) in modes {
            let values: Vec<f64> = series
                .clone()
                .filter_map(|s| s.column_opt(name))
                .flat_map(|v| v.iter().copied())
                .collect();
            columns.insert(name.clone(), ShiftScale::fit(&values, mode));
        }
        Ok(Self {
            time: TimeScale::fit(first, last),
            columns,
        })
    }

    pub fn column(&self, name: &str) -> Option<&ShiftScale> {
        self.columns.get(name)
    }
}

/// Scope options fixed at fit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NormOptions {
    /// One parameter set over all series.
    pub global_normalization: bool,
    /// One time scale over all series even with local normalization.
    pub global_time_normalization: bool,
    /// Series unseen at fit time fall back to global parameters.
    pub unknown_data_normalization: bool,
}

/// Normalization parameters owned by a fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParams {
    options: NormOptions,
    global: ScaleParams,
    local: BTreeMap<String, ScaleParams>,
}

impl NormalizationParams {
    /// Fit parameters for the columns in `modes` (usually the target and regressors).
    pub fn fit(
        collection: &SeriesCollection,
        modes: &BTreeMap<String, NormalizeMode>,
        options: NormOptions,
    ) -> Result<Self> {
        if collection.is_empty() {
            return Err(ForecastError::EmptyData);
        }
        let global = ScaleParams::fit(collection.iter(), modes)?;
        let mut local = BTreeMap::new();
        if !options.global_normalization {
            for s in collection.iter() {
                local.insert(s.id().to_string(), ScaleParams::fit(std::iter::once(s), modes)?);
            }
        }
        tracing::debug!(
            series = collection.len(),
            columns = modes.len(),
            global = options.global_normalization,
            "fitted normalization parameters"
        );
        Ok(Self {
            options,
            global,
            local,
        })
    }

    pub fn options(&self) -> NormOptions {
        self.options
    }

    pub fn global(&self) -> &ScaleParams {
        &self.global
    }

    /// Whether per-series parameters exist for `id`.
    pub fn knows(&self, id: &str) -> bool {
        self.options.global_normalization || self.local.contains_key(id)
    }

    /// Whether unseen identifiers may be normalized.
    pub fn allows_unknown(&self) -> bool {
        self.options.global_normalization || self.options.unknown_data_normalization
    }

    /// Parameters that apply to series `id`.
    pub fn params_for(&self, id: &str) -> Result<&ScaleParams> {
        if self.options.global_normalization {
            return Ok(&self.global);
        }
        match self.local.get(id) {
            Some(p) => Ok(p),
            None if self.options.unknown_data_normalization => Ok(&self.global),
            None => Err(ForecastError::UnknownSeries(id.to_string())),
        }
    }

    fn time_for(&self, id: &str) -> Result<&TimeScale> {
        if self.options.global_time_normalization {
            Ok(&self.global.time)
        } else {
            Ok(&self.params_for(id)?.time)
        }
    }

    /// Normalize every fitted column and add the time feature `t`.
    pub fn apply(&self, series: &Series) -> Result<Series> {
        let params = self.params_for(series.id())?;
        let time = self.time_for(series.id())?;
        let mut out = series.clone();
        for (name, ss) in &params.columns {
            if let Some(values) = series.column_opt(name) {
                out.set_column(name.clone(), values.iter().map(|&v| ss.apply(v)).collect())?;
            }
        }
        out.set_column(
            TIME_FEATURE,
            series.timestamps().iter().map(|ts| time.apply(ts)).collect(),
        )?;
        Ok(out)
    }

    /// Map normalized `values` of `column` back to original units.
    pub fn invert(&self, values: &[f64], id: &str, column: &str) -> Result<Vec<f64>> {
        let ss = self
            .params_for(id)?
            .column(column)
            .ok_or_else(|| ForecastError::MissingColumn(column.to_string()))?;
        Ok(values.iter().map(|&v| ss.invert(v)).collect())
    }

    /// Target parameters of series `id`.
    pub fn target(&self, id: &str) -> Result<ShiftScale> {
        Ok(self
            .params_for(id)?
            .column(TARGET_COLUMN)
            .copied()
            .unwrap_or_else(ShiftScale::identity))
    }

    /// Normalized time of `ts` for series `id`.
    pub fn time(&self, id: &str, ts: &DateTime<Utc>) -> Result<f64> {
        Ok(self.time_for(id)?.apply(ts))
    }
}

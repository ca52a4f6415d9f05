//! Train/validation splitting and cross-validation folds.
//!
//! All sizes are counted in windows: a series of `len` rows holds
//! `len - n_lags + 2 - 2 * n_forecasts` usable samples for splitting. The
//! validation part starts `n_lags` rows before the first validation target so
//! its first window has inputs.

use crate::core::{Series, SeriesCollection};
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Size of the validation part.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValidSize {
    /// Share of the samples, in (0, 1).
    Fraction(f64),
    /// Absolute number of samples.
    Count(usize),
}

impl ValidSize {
    fn samples(&self, n_samples: usize) -> Result<usize> {
        match *self {
            Self::Fraction(p) if p > 0.0 && p < 1.0 => {
                Ok(((n_samples as f64 * p).floor() as usize).max(1))
            }
            Self::Fraction(p) => Err(ForecastError::InvalidParameter(format!(
                "validation fraction must be in (0, 1), got {p}"
            ))),
            Self::Count(0) => Err(ForecastError::InvalidParameter(
                "validation size must be at least 1".to_string(),
            )),
            Self::Count(n) => Ok(n),
        }
    }
}

/// One (train, validation) partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Fold {
    pub train: SeriesCollection,
    pub val: SeriesCollection,
}

/// Number of samples available for splitting.
pub fn split_samples(len: usize, n_lags: usize, n_forecasts: usize) -> usize {
    (len + 2).saturating_sub(n_lags + 2 * n_forecasts)
}

/// Row boundaries `(train_end, val_start)` for a series of `len` rows.
fn split_rows(len: usize, n_lags: usize, n_forecasts: usize, valid: ValidSize) -> Result<(usize, usize)> {
    let n_samples = split_samples(len, n_lags, n_forecasts);
    let n_valid = valid.samples(n_samples)?;
    if n_samples < n_valid + 1 {
        return Err(ForecastError::InsufficientData {
            needed: n_lags + 2 * n_forecasts + n_valid - 1,
            got: len,
        });
    }
    let n_train = n_samples - n_valid;
    let train_end = n_train + n_lags + n_forecasts - 1;
    Ok((train_end, train_end - n_lags))
}

/// Split one series chronologically.
pub fn split_series(
    series: &Series,
    n_lags: usize,
    n_forecasts: usize,
    valid: ValidSize,
) -> Result<(Series, Series)> {
    let (train_end, val_start) = split_rows(series.len(), n_lags, n_forecasts, valid)?;
    Ok((
        series.slice(0, train_end)?,
        series.slice(val_start, series.len())?,
    ))
}

/// Timestamp at which validation targets start when splitting the union of
/// all timestamps of `collection`.
pub fn find_time_threshold(
    collection: &SeriesCollection,
    n_lags: usize,
    n_forecasts: usize,
    valid: ValidSize,
) -> Result<DateTime<Utc>> {
    let union = collection.union_timestamps();
    let (train_end, _) = split_rows(union.len(), n_lags, n_forecasts, valid)?;
    union
        .get(train_end)
        .copied()
        .ok_or(ForecastError::InsufficientData {
            needed: train_end + 1,
            got: union.len(),
        })
}

/// Split one series at an absolute timestamp.
///
/// A series ending at or before the threshold goes entirely to training; one
/// starting after it goes entirely to validation.
pub fn split_considering_timestamp(
    series: &Series,
    n_lags: usize,
    threshold: DateTime<Utc>,
) -> Result<(Option<Series>, Option<Series>)> {
    let (Some(first), Some(last)) = (series.first_timestamp(), series.last_timestamp()) else {
        return Ok((None, None));
    };
    if last <= threshold {
        return Ok((Some(series.clone()), None));
    }
    if first > threshold {
        return Ok((None, Some(series.clone())));
    }
    let train_end = series.timestamps().iter().filter(|ts| **ts < threshold).count();
    let val_start = train_end.saturating_sub(n_lags);
    Ok((
        Some(series.slice(0, train_end)?),
        Some(series.slice(val_start, series.len())?),
    ))
}

/// Split a collection into one fold.
///
/// With `local_split` every series is split on its own; otherwise one
/// threshold over the union of timestamps applies to all series.
pub fn split_collection(
    collection: &SeriesCollection,
    n_lags: usize,
    n_forecasts: usize,
    valid: ValidSize,
    local_split: bool,
) -> Result<Fold> {
    let mut train = SeriesCollection::new();
    let mut val = SeriesCollection::new();
    if local_split {
        for s in collection.iter() {
            let (t, v) = split_series(s, n_lags, n_forecasts, valid)?;
            train.insert(t)?;
            val.insert(v)?;
        }
    } else {
        let threshold = find_time_threshold(collection, n_lags, n_forecasts, valid)?;
        debug!(%threshold, "splitting collection at shared threshold");
        for s in collection.iter() {
            let (t, v) = split_considering_timestamp(s, n_lags, threshold)?;
            if let Some(t) = t {
                train.insert(t)?;
            }
            if let Some(v) = v {
                val.insert(v)?;
            }
        }
    }
    if train.is_empty() || val.is_empty() {
        return Err(ForecastError::InsufficientData {
            needed: n_lags + 2 * n_forecasts,
            got: collection.total_rows(),
        });
    }
    Ok(Fold { train, val })
}

/// Cross-validation fold layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FoldConfig {
    /// Number of folds.
    pub k: usize,
    /// Share of the samples in each validation fold.
    pub fold_pct: f64,
    /// Share of a validation fold shared with the next one.
    pub overlap_pct: f64,
}

impl Default for FoldConfig {
    fn default() -> Self {
        Self {
            k: 5,
            fold_pct: 0.1,
            overlap_pct: 0.0,
        }
    }
}

impl FoldConfig {
    pub fn new(k: usize, fold_pct: f64) -> Self {
        Self {
            k,
            fold_pct,
            overlap_pct: 0.0,
        }
    }

    pub fn with_overlap(mut self, overlap_pct: f64) -> Self {
        self.overlap_pct = overlap_pct;
        self
    }

    /// `(samples_per_fold, overlap)` for `total` samples.
    fn layout(&self, total: usize) -> Result<(usize, usize)> {
        if self.k == 0 {
            return Err(ForecastError::InvalidParameter(
                "k must be at least 1".to_string(),
            ));
        }
        if !(self.fold_pct > 0.0 && self.fold_pct < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "fold_pct must be in (0, 1), got {}",
                self.fold_pct
            )));
        }
        if !(0.0..1.0).contains(&self.overlap_pct) {
            return Err(ForecastError::InvalidParameter(format!(
                "overlap_pct must be in [0, 1), got {}",
                self.overlap_pct
            )));
        }
        let per_fold = ((self.fold_pct * total as f64).floor() as usize).max(1);
        let overlap = (self.overlap_pct * per_fold as f64).floor() as usize;
        if overlap >= per_fold {
            return Err(ForecastError::Configuration(format!(
                "fold overlap {overlap} must be smaller than the fold size {per_fold}"
            )));
        }
        let step = per_fold - overlap;
        let min_train = total.saturating_sub(per_fold + (self.k - 1) * step);
        if min_train < per_fold {
            return Err(ForecastError::InsufficientData {
                needed: per_fold * 2 + (self.k - 1) * step,
                got: total,
            });
        }
        Ok((per_fold, overlap))
    }
}

/// Carve `k` folds out of one series, oldest first.
///
/// Folds are taken from the end backwards; each earlier fold ends
/// `per_fold - overlap` samples before the next.
pub fn crossvalidation_split_series(
    series: &Series,
    n_lags: usize,
    n_forecasts: usize,
    config: FoldConfig,
) -> Result<Vec<(Series, Series)>> {
    let total = split_samples(series.len(), n_lags, n_forecasts);
    let (per_fold, overlap) = config.layout(total)?;
    let mut folds = Vec::with_capacity(config.k);
    let mut current = series.clone();
    for _ in 0..config.k {
        folds.push(split_series(&current, n_lags, n_forecasts, ValidSize::Count(per_fold))?);
        let keep = current.len() - (per_fold - overlap);
        current = current.slice(0, keep)?;
    }
    folds.reverse();
    Ok(folds)
}

/// How folds are formed across series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GlobalCvType {
    /// Shared time thresholds over the union of timestamps.
    #[default]
    GlobalTime,
    /// Independent folds per series, then regrouped.
    Local,
    /// Restrict every series to the common interval, then `Local`.
    Intersect,
}

impl FromStr for GlobalCvType {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "global-time" => Ok(Self::GlobalTime),
            "local" => Ok(Self::Local),
            "intersect" => Ok(Self::Intersect),
            other => Err(ForecastError::InvalidParameter(format!(
                "unknown cross-validation type '{other}'"
            ))),
        }
    }
}

impl fmt::Display for GlobalCvType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::GlobalTime => "global-time",
            Self::Local => "local",
            Self::Intersect => "intersect",
        })
    }
}

/// Latest start and earliest end over all series.
pub fn find_valid_time_interval_for_cv(
    collection: &SeriesCollection,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = collection
        .iter()
        .filter_map(Series::first_timestamp)
        .max()
        .ok_or(ForecastError::EmptyData)?;
    let end = collection
        .iter()
        .filter_map(Series::last_timestamp)
        .min()
        .ok_or(ForecastError::EmptyData)?;
    if start > end {
        return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
    }
    Ok((start, end))
}

/// Regroup per-series folds into `k` collection folds.
///
/// Fails with `FoldCountMismatch` if any series holds a different number of folds.
pub fn unfold_dict_of_folds(
    folds_by_id: BTreeMap<String, Vec<(Series, Series)>>,
    k: usize,
) -> Result<Vec<Fold>> {
    if let Some(bad) = folds_by_id.values().find(|f| f.len() != k) {
        return Err(ForecastError::FoldCountMismatch {
            expected: k,
            got: bad.len(),
        });
    }
    let mut out: Vec<Fold> = (0..k)
        .map(|_| Fold {
            train: SeriesCollection::new(),
            val: SeriesCollection::new(),
        })
        .collect();
    for folds in folds_by_id.into_values() {
        for (fold, (train, val)) in out.iter_mut().zip(folds) {
            fold.train.insert(train)?;
            fold.val.insert(val)?;
        }
    }
    Ok(out)
}

/// Cross-validation folds over a collection.
pub fn crossvalidation_split_collection(
    collection: &SeriesCollection,
    n_lags: usize,
    n_forecasts: usize,
    config: FoldConfig,
    cv_type: GlobalCvType,
) -> Result<Vec<Fold>> {
    match cv_type {
        GlobalCvType::Local => {
            let mut by_id = BTreeMap::new();
            for s in collection.iter() {
                by_id.insert(
                    s.id().to_string(),
                    crossvalidation_split_series(s, n_lags, n_forecasts, config)?,
                );
            }
            unfold_dict_of_folds(by_id, config.k)
        }
        GlobalCvType::Intersect => {
            let (start, end) = find_valid_time_interval_for_cv(collection)?;
            let restricted = collection.try_map(|s| Ok(s.filter_time(|ts| *ts >= start && *ts <= end)))?;
            crossvalidation_split_collection(&restricted, n_lags, n_forecasts, config, GlobalCvType::Local)
        }
        GlobalCvType::GlobalTime => crossvalidation_with_time_threshold(collection, n_lags, n_forecasts, config),
    }
}

fn crossvalidation_with_time_threshold(
    collection: &SeriesCollection,
    n_lags: usize,
    n_forecasts: usize,
    config: FoldConfig,
) -> Result<Vec<Fold>> {
    let union = collection.union_timestamps();
    let total = split_samples(union.len(), n_lags, n_forecasts);
    let (per_fold, overlap) = config.layout(total)?;

    let mut folds = Vec::with_capacity(config.k);
    let mut current = collection.clone();
    let mut end = union.len();
    for _ in 0..config.k {
        folds.push(split_collection(
            &current,
            n_lags,
            n_forecasts,
            ValidSize::Count(per_fold),
            false,
        )?);
        end -= per_fold - overlap;
        let last_kept = union[end - 1];
        current = current.try_map(|s| Ok(s.filter_time(|ts| *ts <= last_kept)))?;
    }
    folds.reverse();
    Ok(folds)
}

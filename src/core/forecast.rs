//! Forecast tables assembled from raw window predictions.

use crate::core::frame::{InputShape, TimeFrame, TARGET_COLUMN};
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Name of the `step`-th (1-based) horizon column.
pub fn yhat_column(step: usize) -> String {
    format!("yhat{step}")
}

/// Name of the quantile column for `step` (1-based) and quantile `q` in (0, 1).
pub fn quantile_column(base: &str, q: f64) -> String {
    format!("{base} {:.1}%", q * 100.0)
}

/// Predictions of one series, in original units, ready to be laid out.
#[derive(Debug, Clone, Copy)]
pub struct SeriesPredictions<'a> {
    pub id: &'a str,
    pub timestamps: &'a [DateTime<Utc>],
    /// Realized values (NaN where unknown).
    pub actuals: &'a [f64],
    /// Row index of the first target of each window.
    pub target_starts: &'a [usize],
    /// `[window][quantile][step]`; quantile 0 is the median.
    pub values: &'a [Vec<Vec<f64>>],
}

/// One row of a [`ForecastTable`].
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRow {
    pub ds: DateTime<Utc>,
    pub id: String,
    pub y: Option<f64>,
    /// `yhat[k]` is the forecast made `k + 1` steps before `ds`.
    pub yhat: Vec<Option<f64>>,
    /// `quantiles[q][k]` for each extra quantile.
    pub quantiles: Vec<Vec<Option<f64>>>,
}

/// User-facing forecast: one row per timestamp and series.
///
/// Forecasts of different horizons that land on the same timestamp are kept in
/// separate `yhat<k>` columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastTable {
    n_forecasts: usize,
    quantiles: Vec<f64>,
    shape: InputShape,
    rows: Vec<ForecastRow>,
}

impl ForecastTable {
    /// Empty table; `quantiles` lists the extra quantiles besides the median.
    pub fn new(n_forecasts: usize, quantiles: Vec<f64>, shape: InputShape) -> Self {
        Self {
            n_forecasts,
            quantiles,
            shape,
            rows: Vec::new(),
        }
    }

    /// Lay out the window predictions of one series.
    pub fn push_series(&mut self, p: SeriesPredictions<'_>) -> Result<()> {
        if p.actuals.len() != p.timestamps.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: p.timestamps.len(),
                got: p.actuals.len(),
            });
        }
        if p.target_starts.len() != p.values.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: p.target_starts.len(),
                got: p.values.len(),
            });
        }

        let n = p.timestamps.len();
        let nq = self.quantiles.len();
        let mut yhat = vec![vec![None; self.n_forecasts]; n];
        let mut quant = vec![vec![vec![None; self.n_forecasts]; nq]; n];

        for (&start, window) in p.target_starts.iter().zip(p.values) {
            let median = window.first().ok_or_else(|| {
                ForecastError::ComputationError("window without predictions".to_string())
            })?;
            for (k, &value) in median.iter().enumerate().take(self.n_forecasts) {
                let row = start + k;
                if row >= n {
                    break;
                }
                yhat[row][k] = Some(value);
                for q in 0..nq {
                    if let Some(v) = window.get(q + 1).and_then(|w| w.get(k)) {
                        quant[row][q][k] = Some(*v);
                    }
                }
            }
        }

        for (i, (yh, qs)) in yhat.into_iter().zip(quant).enumerate() {
            let actual = p.actuals[i];
            self.rows.push(ForecastRow {
                ds: p.timestamps[i],
                id: p.id.to_string(),
                y: (!actual.is_nan()).then_some(actual),
                yhat: yh,
                quantiles: qs,
            });
        }
        Ok(())
    }

    pub fn rows(&self) -> &[ForecastRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn n_forecasts(&self) -> usize {
        self.n_forecasts
    }

    pub fn quantiles(&self) -> &[f64] {
        &self.quantiles
    }

    pub fn shape(&self) -> InputShape {
        self.shape
    }

    /// Distinct series identifiers in row order.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for row in &self.rows {
            if ids.last() != Some(&row.id) {
                ids.push(row.id.clone());
            }
        }
        ids
    }

    /// Output column names in order.
    pub fn column_names(&self) -> Vec<String> {
        let mut names = vec!["ds".to_string()];
        if self.shape == InputShape::Collection {
            names.push("ID".to_string());
        }
        names.push(TARGET_COLUMN.to_string());
        for k in 1..=self.n_forecasts {
            names.push(yhat_column(k));
        }
        for k in 1..=self.n_forecasts {
            for &q in &self.quantiles {
                names.push(quantile_column(&yhat_column(k), q));
            }
        }
        names
    }

    /// Values of a numeric column by name.
    pub fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        if name == TARGET_COLUMN {
            return Some(self.rows.iter().map(|r| r.y).collect());
        }
        for k in 1..=self.n_forecasts {
            let base = yhat_column(k);
            if name == base {
                return Some(self.rows.iter().map(|r| r.yhat[k - 1]).collect());
            }
            for (qi, &q) in self.quantiles.iter().enumerate() {
                if name == quantile_column(&base, q) {
                    return Some(self.rows.iter().map(|r| r.quantiles[qi][k - 1]).collect());
                }
            }
        }
        None
    }

    /// Forecasts made `step` (1-based) steps ahead.
    pub fn yhat(&self, step: usize) -> Option<Vec<Option<f64>>> {
        self.column(&yhat_column(step))
    }

    /// Rows of one series.
    pub fn for_id(&self, id: &str) -> ForecastTable {
        ForecastTable {
            n_forecasts: self.n_forecasts,
            quantiles: self.quantiles.clone(),
            shape: InputShape::Single,
            rows: self.rows.iter().filter(|r| r.id == id).cloned().collect(),
        }
    }

    /// Split into one table per series.
    pub fn split_by_id(&self) -> BTreeMap<String, ForecastTable> {
        self.ids()
            .into_iter()
            .map(|id| {
                let table = self.for_id(&id);
                (id, table)
            })
            .collect()
    }

    /// Convert to a frame, encoding absent values as NaN.
    ///
    /// The `ID` column is present only for collection-shaped forecasts.
    pub fn to_frame(&self) -> Result<TimeFrame> {
        let mut frame = TimeFrame::new(self.rows.iter().map(|r| r.ds).collect());
        if self.shape == InputShape::Collection {
            frame = frame.with_ids(self.rows.iter().map(|r| r.id.clone()).collect())?;
        }
        for name in self.column_names().into_iter().skip_while(|n| n != TARGET_COLUMN) {
            if let Some(values) = self.column(&name) {
                frame.set_column(name, values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())?;
            }
        }
        Ok(frame)
    }

    /// Most recent forecasts for one series, aligned by origin.
    ///
    /// Column `origin-0` holds the forecast issued from the last row with a known
    /// value; `origin-j` the one issued `j` rows earlier. Rows cover the
    /// forecast horizon of `origin-0` plus the `include_previous` rows before it.
    pub fn latest_forecast(&self, id: Option<&str>, include_previous: usize) -> Result<LatestForecast> {
        let id = match id {
            Some(id) => id.to_string(),
            None => {
                let ids = self.ids();
                match ids.as_slice() {
                    [only] => only.clone(),
                    _ => {
                        return Err(ForecastError::InvalidParameter(
                            "a series identifier is required for multi-series forecasts".to_string(),
                        ))
                    }
                }
            }
        };
        let rows: Vec<&ForecastRow> = self.rows.iter().filter(|r| r.id == id).collect();
        if rows.is_empty() {
            return Err(ForecastError::UnknownSeries(id));
        }
        let last = rows
            .iter()
            .rposition(|r| r.y.is_some())
            .ok_or_else(|| ForecastError::MissingData {
                column: TARGET_COLUMN.to_string(),
                count: rows.len(),
            })?;
        if include_previous > last {
            return Err(ForecastError::InsufficientData {
                needed: include_previous + 1,
                got: last + 1,
            });
        }

        let first = last + 1 - include_previous;
        let end = (last + self.n_forecasts).min(rows.len() - 1);
        let out = (first..=end)
            .map(|r| {
                let origins = (0..=include_previous)
                    .map(|j| {
                        let origin = last - j;
                        let step = r.checked_sub(origin)?;
                        if (1..=self.n_forecasts).contains(&step) {
                            rows[r].yhat[step - 1]
                        } else {
                            None
                        }
                    })
                    .collect();
                LatestRow {
                    ds: rows[r].ds,
                    y: rows[r].y,
                    origins,
                }
            })
            .collect();
        Ok(LatestForecast { id, rows: out })
    }
}

/// Row of a [`LatestForecast`].
#[derive(Debug, Clone, PartialEq)]
pub struct LatestRow {
    pub ds: DateTime<Utc>,
    pub y: Option<f64>,
    /// `origins[j]` is the `origin-j` forecast.
    pub origins: Vec<Option<f64>>,
}

/// Forecasts of one series re-indexed by the origin they were issued from.
#[derive(Debug, Clone, PartialEq)]
pub struct LatestForecast {
    pub id: String,
    pub rows: Vec<LatestRow>,
}

impl LatestForecast {
    /// Values of column `origin-j`.
    pub fn origin(&self, j: usize) -> Vec<Option<f64>> {
        self.rows
            .iter()
            .map(|r| r.origins.get(j).copied().flatten())
            .collect()
    }
}

/// One row per window: forecasts indexed by step rather than by timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// Timestamp of the first forecast step.
    pub ds: DateTime<Utc>,
    pub id: String,
    /// `steps[k]` is the forecast for `k` steps after `ds`.
    pub steps: Vec<f64>,
    pub quantiles: Vec<Vec<f64>>,
}

/// Raw multi-step forecast with `step<k>` columns.
#[derive(Debug, Clone, PartialEq)]
pub struct RawForecast {
    n_forecasts: usize,
    quantiles: Vec<f64>,
    rows: Vec<RawRow>,
}

impl RawForecast {
    pub fn new(n_forecasts: usize, quantiles: Vec<f64>) -> Self {
        Self {
            n_forecasts,
            quantiles,
            rows: Vec::new(),
        }
    }

    pub fn push_series(&mut self, p: SeriesPredictions<'_>) -> Result<()> {
        for (&start, window) in p.target_starts.iter().zip(p.values) {
            let ds = *p.timestamps.get(start).ok_or_else(|| {
                ForecastError::ComputationError(format!("window target row {start} out of range"))
            })?;
            let mut sets = window.iter().cloned();
            let steps = sets.next().unwrap_or_default();
            self.rows.push(RawRow {
                ds,
                id: p.id.to_string(),
                steps,
                quantiles: sets.collect(),
            });
        }
        Ok(())
    }

    pub fn rows(&self) -> &[RawRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<String> {
        let mut names = vec!["ds".to_string(), "ID".to_string()];
        names.extend((0..self.n_forecasts).map(|k| format!("step{k}")));
        for k in 0..self.n_forecasts {
            for &q in &self.quantiles {
                names.push(quantile_column(&format!("step{k}"), q));
            }
        }
        names
    }

    /// Values of `step<k>` (0-based).
    pub fn step(&self, k: usize) -> Vec<f64> {
        self.rows
            .iter()
            .map(|r| r.steps.get(k).copied().unwrap_or(f64::NAN))
            .collect()
    }
}

//! Per-series data structures.

use crate::core::frame::{TimeFrame, TARGET_COLUMN};
use crate::core::frequency::Frequency;
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// One identified time series with named numeric columns.
///
/// Timestamps are strictly increasing. `breaks` holds the row indices at which
/// rows were excised: row `b - 1` and row `b` are not adjacent in time and no
/// window may contain both.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    id: String,
    timestamps: Vec<DateTime<Utc>>,
    columns: BTreeMap<String, Vec<f64>>,
    breaks: Vec<usize>,
    frequency: Option<Frequency>,
}

impl Series {
    pub fn new(
        id: impl Into<String>,
        timestamps: Vec<DateTime<Utc>>,
        columns: BTreeMap<String, Vec<f64>>,
    ) -> Result<Self> {
        for i in 1..timestamps.len() {
            if timestamps[i] <= timestamps[i - 1] {
                return Err(ForecastError::TimestampError(
                    "timestamps must be strictly increasing".to_string(),
                ));
            }
        }
        for values in columns.values() {
            if values.len() != timestamps.len() {
                return Err(ForecastError::DimensionMismatch {
                    expected: timestamps.len(),
                    got: values.len(),
                });
            }
        }
        Ok(Self {
            id: id.into(),
            timestamps,
            columns,
            breaks: Vec::new(),
            frequency: None,
        })
    }

    /// Series holding only a target column.
    pub fn univariate(
        id: impl Into<String>,
        timestamps: Vec<DateTime<Utc>>,
        values: Vec<f64>,
    ) -> Result<Self> {
        let mut columns = BTreeMap::new();
        columns.insert(TARGET_COLUMN.to_string(), values);
        Self::new(id, timestamps, columns)
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = Some(frequency);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    pub fn frequency(&self) -> Option<Frequency> {
        self.frequency
    }

    pub fn set_frequency(&mut self, frequency: Frequency) {
        self.frequency = Some(frequency);
    }

    /// Values of a column, failing with `MissingColumn` if absent.
    pub fn column(&self, name: &str) -> Result<&[f64]> {
        self.columns
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| ForecastError::MissingColumn(name.to_string()))
    }

    pub fn column_opt(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn columns(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Target values (empty if the series carries no target).
    pub fn target(&self) -> &[f64] {
        self.column_opt(TARGET_COLUMN).unwrap_or(&[])
    }

    pub fn set_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        if values.len() != self.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.len(),
                got: values.len(),
            });
        }
        self.columns.insert(name.into(), values);
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Vec<f64>> {
        self.columns.remove(name)
    }

    /// Number of NaN entries in a column (0 if absent).
    pub fn missing_count(&self, name: &str) -> usize {
        self.column_opt(name)
            .map(|v| v.iter().filter(|x| x.is_nan()).count())
            .unwrap_or(0)
    }

    pub fn breaks(&self) -> &[usize] {
        &self.breaks
    }

    /// Whether rows `[start, end)` contain no break.
    pub fn is_contiguous(&self, start: usize, end: usize) -> bool {
        !self.breaks.iter().any(|&b| b > start && b < end)
    }

    /// Keep the listed rows (ascending), recording a break wherever kept rows
    /// were not adjacent.
    pub fn select_rows(&self, keep: &[usize]) -> Series {
        let mut breaks: Vec<usize> = Vec::new();
        for (pos, window) in keep.windows(2).enumerate() {
            let (prev, next) = (window[0], window[1]);
            let excised = next != prev + 1;
            let carried = self.breaks.iter().any(|&b| b > prev && b <= next);
            if excised || carried {
                breaks.push(pos + 1);
            }
        }
        Series {
            id: self.id.clone(),
            timestamps: keep.iter().map(|&i| self.timestamps[i]).collect(),
            columns: self
                .columns
                .iter()
                .map(|(k, v)| (k.clone(), keep.iter().map(|&i| v[i]).collect()))
                .collect(),
            breaks,
            frequency: self.frequency,
        }
    }

    /// Rows `[start, end)`.
    pub fn slice(&self, start: usize, end: usize) -> Result<Series> {
        if start > end || end > self.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "invalid row range {start}..{end} for series of length {}",
                self.len()
            )));
        }
        Ok(Series {
            id: self.id.clone(),
            timestamps: self.timestamps[start..end].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|(k, v)| (k.clone(), v[start..end].to_vec()))
                .collect(),
            breaks: self
                .breaks
                .iter()
                .filter(|&&b| b > start && b < end)
                .map(|&b| b - start)
                .collect(),
            frequency: self.frequency,
        })
    }

    /// Rows whose timestamp satisfies `keep`.
    pub fn filter_time<F>(&self, keep: F) -> Series
    where
        F: Fn(&DateTime<Utc>) -> bool,
    {
        let idx: Vec<usize> = (0..self.len())
            .filter(|&i| keep(&self.timestamps[i]))
            .collect();
        self.select_rows(&idx)
    }

    /// Append rows that start strictly after the last timestamp.
    ///
    /// Columns missing from `other` are filled with NaN.
    pub fn append(&mut self, other: &Series) -> Result<()> {
        if let (Some(last), Some(first)) = (self.last_timestamp(), other.first_timestamp()) {
            if first <= last {
                return Err(ForecastError::TimestampError(
                    "appended rows must start after the last timestamp".to_string(),
                ));
            }
        }
        let offset = self.len();
        let n = other.len();
        for (name, values) in self.columns.iter_mut() {
            match other.columns.get(name) {
                Some(src) => values.extend_from_slice(src),
                None => values.extend(std::iter::repeat(f64::NAN).take(n)),
            }
        }
        self.timestamps.extend_from_slice(&other.timestamps);
        self.breaks.extend(other.breaks.iter().map(|&b| b + offset));
        Ok(())
    }

    /// Convert to a frame tagged with this series' identifier.
    pub fn to_frame(&self) -> Result<TimeFrame> {
        let mut frame = TimeFrame::new(self.timestamps.clone()).with_id(self.id.clone());
        for (name, values) in &self.columns {
            frame.set_column(name.clone(), values.clone())?;
        }
        Ok(frame)
    }
}

/// Series keyed by identifier, iterated in identifier order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesCollection {
    series: BTreeMap<String, Series>,
}

impl SeriesCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_series(series: Vec<Series>) -> Result<Self> {
        let mut out = Self::new();
        for s in series {
            out.insert(s)?;
        }
        Ok(out)
    }

    /// Insert a series, failing if its identifier is already present.
    pub fn insert(&mut self, series: Series) -> Result<()> {
        if self.series.contains_key(series.id()) {
            return Err(ForecastError::Validation(format!(
                "duplicate series identifier '{}'",
                series.id()
            )));
        }
        self.series.insert(series.id().to_string(), series);
        Ok(())
    }

    /// Insert or replace a series.
    pub fn upsert(&mut self, series: Series) {
        self.series.insert(series.id().to_string(), series);
    }

    pub fn get(&self, id: &str) -> Option<&Series> {
        self.series.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.series.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn iter(&self) -> std::collections::btree_map::Values<'_, String, Series> {
        self.series.values()
    }

    pub fn total_rows(&self) -> usize {
        self.series.values().map(Series::len).sum()
    }

    /// Sorted, de-duplicated union of all timestamps.
    pub fn union_timestamps(&self) -> Vec<DateTime<Utc>> {
        let mut all: Vec<DateTime<Utc>> = self
            .series
            .values()
            .flat_map(|s| s.timestamps().iter().copied())
            .collect();
        all.sort();
        all.dedup();
        all
    }

    /// Apply `f` to every series.
    pub fn try_map<F>(&self, mut f: F) -> Result<SeriesCollection>
    where
        F: FnMut(&Series) -> Result<Series>,
    {
        let mut out = SeriesCollection::new();
        for s in self.series.values() {
            out.upsert(f(s)?);
        }
        Ok(out)
    }

    /// Merge into one long frame with an `ID` column.
    pub fn to_frame(&self) -> Result<TimeFrame> {
        let frames = self
            .series
            .values()
            .map(Series::to_frame)
            .collect::<Result<Vec<_>>>()?;
        TimeFrame::concat(&frames)
    }
}

impl IntoIterator for SeriesCollection {
    type Item = Series;
    type IntoIter = std::collections::btree_map::IntoValues<String, Series>;

    fn into_iter(self) -> Self::IntoIter {
        self.series.into_values()
    }
}

//! In-memory tabular input.
//!
//! A [`TimeFrame`] is the long-format table callers hand to the library: a
//! timestamp column, an optional series-identifier column and any number of
//! named numeric columns (the target is named `y`). Missing numeric values are
//! encoded as NaN.

use crate::error::{ForecastError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Name of the timestamp column.
pub const TIME_COLUMN: &str = "ds";
/// Name of the target column.
pub const TARGET_COLUMN: &str = "y";
/// Name of the series-identifier column.
pub const ID_COLUMN: &str = "ID";
/// Identifier given to a table that carries no identifier column.
pub const SINGLE_SERIES_ID: &str = "__df__";

/// Shape of the caller's input, remembered so outputs can mirror it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InputShape {
    /// One table without identifiers.
    #[default]
    Single,
    /// Several series keyed by identifier.
    Collection,
}

/// Long-format table of timestamps, identifiers and numeric columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeFrame {
    ds: Vec<DateTime<Utc>>,
    ids: Option<Vec<String>>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl TimeFrame {
    pub fn new(ds: Vec<DateTime<Utc>>) -> Self {
        Self {
            ds,
            ids: None,
            columns: BTreeMap::new(),
        }
    }

    /// Build a frame from textual timestamps.
    ///
    /// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`,
    /// `YYYY-MM-DD HH:MM` and plain dates.
    pub fn from_strings<S: AsRef<str>>(ds: &[S]) -> Result<Self> {
        let parsed = ds
            .iter()
            .map(|s| parse_timestamp(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(parsed))
    }

    /// Add or replace a numeric column.
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        self.set_column(name, values)?;
        Ok(self)
    }

    /// Add or replace the target column.
    pub fn with_target(self, values: Vec<f64>) -> Result<Self> {
        self.with_column(TARGET_COLUMN, values)
    }

    /// Tag every row with the same identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.ids = Some(vec![id; self.ds.len()]);
        self
    }

    /// Set per-row identifiers.
    pub fn with_ids(mut self, ids: Vec<String>) -> Result<Self> {
        if ids.len() != self.ds.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.ds.len(),
                got: ids.len(),
            });
        }
        self.ids = Some(ids);
        Ok(self)
    }

    /// Drop the identifier column.
    pub fn without_ids(mut self) -> Self {
        self.ids = None;
        self
    }

    pub fn set_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if name == TIME_COLUMN || name == ID_COLUMN {
            return Err(ForecastError::Validation(format!(
                "'{name}' is reserved and cannot be used as a numeric column"
            )));
        }
        if values.len() != self.ds.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.ds.len(),
                got: values.len(),
            });
        }
        self.columns.insert(name, values);
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Vec<f64>> {
        self.columns.remove(name)
    }

    pub fn len(&self) -> usize {
        self.ds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ds.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.ds
    }

    pub fn ids(&self) -> Option<&[String]> {
        self.ids.as_deref()
    }

    pub fn has_ids(&self) -> bool {
        self.ids.is_some()
    }

    /// Identifier of row `i`, falling back to the single-series sentinel.
    pub fn id_at(&self, i: usize) -> &str {
        self.ids
            .as_ref()
            .and_then(|ids| ids.get(i))
            .map(String::as_str)
            .unwrap_or(SINGLE_SERIES_ID)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn columns(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.columns
    }

    /// Distinct identifiers in sorted order.
    pub fn distinct_ids(&self) -> Vec<String> {
        match &self.ids {
            Some(ids) => ids
                .iter()
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            None => vec![SINGLE_SERIES_ID.to_string()],
        }
    }

    /// Keep the rows for which `keep` returns true.
    pub fn filter_rows<F>(&self, keep: F) -> TimeFrame
    where
        F: Fn(usize) -> bool,
    {
        let idx: Vec<usize> = (0..self.len()).filter(|&i| keep(i)).collect();
        self.take(&idx)
    }

    /// Rows belonging to one series.
    pub fn for_id(&self, id: &str) -> TimeFrame {
        self.filter_rows(|i| self.id_at(i) == id)
    }

    /// Contiguous row range `[start, end)`.
    pub fn slice(&self, start: usize, end: usize) -> Result<TimeFrame> {
        if start > end {
            return Err(ForecastError::InvalidParameter(
                "start must be <= end".to_string(),
            ));
        }
        if end > self.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "row range end {end} exceeds frame length {}",
                self.len()
            )));
        }
        Ok(self.take(&(start..end).collect::<Vec<_>>()))
    }

    /// Last `n` rows (all rows if fewer).
    pub fn tail(&self, n: usize) -> TimeFrame {
        let start = self.len().saturating_sub(n);
        self.take(&(start..self.len()).collect::<Vec<_>>())
    }

    /// Select rows by index, in the given order.
    pub fn take(&self, idx: &[usize]) -> TimeFrame {
        TimeFrame {
            ds: idx.iter().map(|&i| self.ds[i]).collect(),
            ids: self
                .ids
                .as_ref()
                .map(|ids| idx.iter().map(|&i| ids[i].clone()).collect()),
            columns: self
                .columns
                .iter()
                .map(|(k, v)| (k.clone(), idx.iter().map(|&i| v[i]).collect()))
                .collect(),
        }
    }

    /// Stack frames vertically.
    ///
    /// Every frame must carry the same numeric columns, and either all or none
    /// of them must carry identifiers.
    pub fn concat(frames: &[TimeFrame]) -> Result<TimeFrame> {
        let Some(first) = frames.first() else {
            return Ok(TimeFrame::default());
        };
        let names: BTreeSet<&String> = first.columns.keys().collect();
        let with_ids = first.ids.is_some();

        let mut out = TimeFrame {
            ds: Vec::new(),
            ids: with_ids.then(Vec::new),
            columns: first.columns.keys().map(|k| (k.clone(), Vec::new())).collect(),
        };

        for frame in frames {
            if frame.columns.keys().collect::<BTreeSet<_>>() != names {
                return Err(ForecastError::Validation(
                    "cannot concatenate frames with different columns".to_string(),
                ));
            }
            if frame.ids.is_some() != with_ids {
                return Err(ForecastError::Validation(
                    "cannot concatenate frames with and without an ID column".to_string(),
                ));
            }
            out.ds.extend_from_slice(&frame.ds);
            if let (Some(dst), Some(src)) = (out.ids.as_mut(), frame.ids.as_ref()) {
                dst.extend(src.iter().cloned());
            }
            for (name, values) in &frame.columns {
                if let Some(dst) = out.columns.get_mut(name) {
                    dst.extend_from_slice(values);
                }
            }
        }
        Ok(out)
    }
}

/// Caller input: one table, or several tables keyed by series identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesInput {
    /// One table, with or without an `ID` column.
    Frame(TimeFrame),
    /// Tables keyed by identifier; any `ID` column inside them is ignored.
    Map(BTreeMap<String, TimeFrame>),
}

impl From<TimeFrame> for SeriesInput {
    fn from(frame: TimeFrame) -> Self {
        Self::Frame(frame)
    }
}

impl From<&TimeFrame> for SeriesInput {
    fn from(frame: &TimeFrame) -> Self {
        Self::Frame(frame.clone())
    }
}

impl From<BTreeMap<String, TimeFrame>> for SeriesInput {
    fn from(map: BTreeMap<String, TimeFrame>) -> Self {
        Self::Map(map)
    }
}

/// One occurrence of a named event, optionally bound to a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventOccurrence {
    pub event: String,
    pub ds: DateTime<Utc>,
    pub id: Option<String>,
}

/// Table of event occurrences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventTable {
    rows: Vec<EventOccurrence>,
}

impl EventTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Occurrences of `event` on each of `dates`.
    pub fn from_dates(event: impl Into<String>, dates: Vec<DateTime<Utc>>) -> Self {
        let event = event.into();
        Self {
            rows: dates
                .into_iter()
                .map(|ds| EventOccurrence {
                    event: event.clone(),
                    ds,
                    id: None,
                })
                .collect(),
        }
    }

    pub fn with_occurrence(mut self, event: impl Into<String>, ds: DateTime<Utc>) -> Self {
        self.rows.push(EventOccurrence {
            event: event.into(),
            ds,
            id: None,
        });
        self
    }

    /// Bind every occurrence to series `id`.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        for row in &mut self.rows {
            row.id = Some(id.clone());
        }
        self
    }

    pub fn concat(tables: &[EventTable]) -> EventTable {
        EventTable {
            rows: tables.iter().flat_map(|t| t.rows.iter().cloned()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventOccurrence> {
        self.rows.iter()
    }

    /// Distinct series identifiers referenced by the table.
    pub fn distinct_ids(&self) -> BTreeSet<String> {
        self.rows.iter().filter_map(|r| r.id.clone()).collect()
    }

    /// Whether any occurrence carries a series identifier.
    pub fn has_ids(&self) -> bool {
        self.rows.iter().any(|r| r.id.is_some())
    }

    /// Occurrences relevant to series `id` (unbound occurrences apply to every series).
    pub fn for_id<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a EventOccurrence> + 'a {
        self.rows
            .iter()
            .filter(move |r| r.id.as_deref().map_or(true, |rid| rid == id))
    }
}

/// Future values of regressors, aligned by position with the periods to forecast.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegressorTable {
    ids: Option<Vec<String>>,
    columns: BTreeMap<String, Vec<f64>>,
    rows: usize,
}

impl RegressorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        if !self.columns.is_empty() && values.len() != self.rows {
            return Err(ForecastError::DimensionMismatch {
                expected: self.rows,
                got: values.len(),
            });
        }
        self.rows = values.len();
        self.columns.insert(name.into(), values);
        Ok(self)
    }

    /// Bind every row to series `id`.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.ids = Some(vec![id; self.rows]);
        self
    }

    pub fn concat(tables: &[RegressorTable]) -> Result<RegressorTable> {
        let mut out = RegressorTable::default();
        for (n, table) in tables.iter().enumerate() {
            if n > 0 && table.ids.is_some() != out.ids.is_some() {
                return Err(ForecastError::Validation(
                    "cannot concatenate regressor tables with and without identifiers".to_string(),
                ));
            }
            if n == 0 {
                out.ids = table.ids.as_ref().map(|_| Vec::new());
            } else if table.columns.keys().ne(out.columns.keys()) {
                return Err(ForecastError::Validation(
                    "cannot concatenate regressor tables with different columns".to_string(),
                ));
            }
            if let (Some(dst), Some(src)) = (out.ids.as_mut(), table.ids.as_ref()) {
                dst.extend(src.iter().cloned());
            }
            for (name, values) in &table.columns {
                out.columns
                    .entry(name.clone())
                    .or_default()
                    .extend_from_slice(values);
            }
            out.rows += table.rows;
        }
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn has_ids(&self) -> bool {
        self.ids.is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn distinct_ids(&self) -> BTreeSet<String> {
        self.ids
            .as_ref()
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Columns restricted to the rows of series `id`; rows without identifiers match any series.
    pub fn for_id(&self, id: &str) -> BTreeMap<String, Vec<f64>> {
        let keep: Vec<usize> = match &self.ids {
            Some(ids) => (0..self.rows).filter(|&i| ids[i] == id).collect(),
            None => (0..self.rows).collect(),
        };
        self.columns
            .iter()
            .map(|(k, v)| (k.clone(), keep.iter().map(|&i| v[i]).collect()))
            .collect()
    }
}

/// Parse a timestamp in one of the accepted textual formats (interpreted as UTC).
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(ForecastError::TimestampError(format!(
        "could not parse '{s}' as a timestamp"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn days(n: usize) -> Vec<DateTime<Utc>> {
        let base = Utc.with_ymd_and_hms(2022, 10, 16, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| base + chrono::Duration::days(i as i64))
            .collect()
    }

    #[test]
    fn parses_textual_timestamps() {
        let frame = TimeFrame::from_strings(&[
            "2022-10-16 00:00:00",
            "2022-10-17",
            "2022-10-18T00:00:00",
        ])
        .unwrap();
        assert_eq!(frame.timestamps(), days(3).as_slice());

        assert!(matches!(
            TimeFrame::from_strings(&["not a date"]),
            Err(ForecastError::TimestampError(_))
        ));
    }

    #[test]
    fn rejects_mismatched_column_length() {
        let result = TimeFrame::new(days(3)).with_target(vec![1.0, 2.0]);
        assert!(matches!(
            result,
            Err(ForecastError::DimensionMismatch { expected: 3, got: 2 })
        ));
    }

    #[test]
    fn rejects_reserved_column_names() {
        let result = TimeFrame::new(days(2)).with_column("ds", vec![1.0, 2.0]);
        assert!(matches!(result, Err(ForecastError::Validation(_))));
    }

    #[test]
    fn concat_and_filter_by_id() {
        let a = TimeFrame::new(days(3))
            .with_target(vec![1.0, 2.0, 3.0])
            .unwrap()
            .with_id("a");
        let b = TimeFrame::new(days(2))
            .with_target(vec![4.0, 5.0])
            .unwrap()
            .with_id("b");
        let both = TimeFrame::concat(&[a.clone(), b]).unwrap();

        assert_eq!(both.len(), 5);
        assert_eq!(both.distinct_ids(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(both.for_id("a"), a);
        assert_eq!(both.for_id("b").column("y").unwrap(), &[4.0, 5.0]);
    }

    #[test]
    fn concat_rejects_mixed_identifiers() {
        let a = TimeFrame::new(days(1)).with_target(vec![1.0]).unwrap();
        let b = a.clone().with_id("b");
        assert!(TimeFrame::concat(&[a, b]).is_err());
    }

    #[test]
    fn frames_without_ids_use_the_sentinel() {
        let frame = TimeFrame::new(days(2)).with_target(vec![1.0, 2.0]).unwrap();
        assert_eq!(frame.distinct_ids(), vec![SINGLE_SERIES_ID.to_string()]);
        assert_eq!(frame.id_at(1), SINGLE_SERIES_ID);
    }

    #[test]
    fn event_table_filters_by_series() {
        let ts = days(3);
        let shared = EventTable::from_dates("playoff", vec![ts[0]]);
        let bound = EventTable::from_dates("playoff", vec![ts[1]]).with_id("df1");
        let table = EventTable::concat(&[shared, bound]);

        assert_eq!(table.for_id("df1").count(), 2);
        assert_eq!(table.for_id("df2").count(), 1);
        assert!(table.has_ids());
    }

    #[test]
    fn regressor_table_splits_by_series() {
        let a = RegressorTable::new()
            .with_column("A", vec![1.0, 2.0])
            .unwrap()
            .with_id("df1");
        let b = RegressorTable::new()
            .with_column("A", vec![3.0])
            .unwrap()
            .with_id("df2");
        let table = RegressorTable::concat(&[a, b]).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.for_id("df1")["A"], vec![1.0, 2.0]);
        assert_eq!(table.for_id("df2")["A"], vec![3.0]);
    }
}

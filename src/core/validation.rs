//! Input validation and conversion of frames into series collections.

use crate::core::frame::{TimeFrame, ID_COLUMN, SINGLE_SERIES_ID, TARGET_COLUMN, TIME_COLUMN};
use crate::core::series::{Series, SeriesCollection};
use crate::error::{ForecastError, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// Names the model produces itself; user columns may not shadow them.
const RESERVED_NAMES: &[&str] = &[
    TIME_COLUMN,
    TARGET_COLUMN,
    ID_COLUMN,
    "t",
    "y_scaled",
    "trend",
    "season",
    "seasonality",
    "ar",
    "events",
    "future_regressors",
    "lagged_regressors",
    "residuals",
];

/// Prefixes reserved for output columns.
const RESERVED_PREFIXES: &[&str] = &["yhat", "step", "season_", "event_", "ar_", "lagged_"];

/// Options for [`check_dataframe`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckOptions<'a> {
    /// Fail with `MissingColumn` if the target is absent.
    pub require_target: bool,
    /// Rows may hold unknown future targets (prediction input).
    pub future: bool,
    /// Registered regressor and event columns that must be present.
    pub registered: &'a [String],
}

/// Validate a frame and split it into one sorted [`Series`] per identifier.
///
/// Rows of each series are ordered by timestamp; duplicated timestamps within a
/// series, infinite values and missing registered columns are rejected.
/// Columns that are neither the target nor registered are dropped.
pub fn check_dataframe(frame: &TimeFrame, options: CheckOptions<'_>) -> Result<SeriesCollection> {
    if frame.is_empty() {
        return Err(ForecastError::EmptyData);
    }
    if options.require_target && !frame.has_column(TARGET_COLUMN) {
        return Err(ForecastError::MissingColumn(TARGET_COLUMN.to_string()));
    }
    for name in options.registered {
        if !frame.has_column(name) {
            return Err(ForecastError::MissingColumn(name.clone()));
        }
    }

    let dropped: Vec<&str> = frame
        .column_names()
        .filter(|c| *c != TARGET_COLUMN && !options.registered.iter().any(|r| r == c))
        .collect();
    if !dropped.is_empty() {
        debug!(columns = ?dropped, "dropping unregistered columns");
    }

    for (name, values) in frame.columns() {
        if values.iter().any(|v| v.is_infinite()) {
            return Err(ForecastError::Validation(format!(
                "column '{name}' contains infinite values"
            )));
        }
    }

    let mut rows_by_id: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for i in 0..frame.len() {
        rows_by_id.entry(frame.id_at(i)).or_default().push(i);
    }

    let mut collection = SeriesCollection::new();
    for (id, mut rows) in rows_by_id {
        let ds = frame.timestamps();
        if rows.windows(2).any(|w| ds[w[0]] > ds[w[1]]) {
            debug!(series = id, "sorting rows by timestamp");
            rows.sort_by_key(|&i| ds[i]);
        }
        if let Some(w) = rows.windows(2).find(|w| ds[w[0]] == ds[w[1]]) {
            return Err(ForecastError::TimestampError(format!(
                "series '{id}' has duplicate timestamp {}",
                ds[w[0]]
            )));
        }

        let mut columns = BTreeMap::new();
        for (name, values) in frame.columns() {
            if name == TARGET_COLUMN || options.registered.contains(name) {
                columns.insert(name.clone(), rows.iter().map(|&i| values[i]).collect::<Vec<_>>());
            }
        }

        if let Some(y) = columns.get(TARGET_COLUMN) {
            if !options.future && y.iter().all(|v: &f64| v.is_nan()) {
                return Err(ForecastError::MissingData {
                    column: TARGET_COLUMN.to_string(),
                    count: y.len(),
                });
            }
        }
        for name in options.registered {
            if let Some(values) = columns.get(name) {
                if values.iter().all(|v| v.is_nan()) {
                    return Err(ForecastError::MissingData {
                        column: name.clone(),
                        count: values.len(),
                    });
                }
            }
        }

        let timestamps = rows.iter().map(|&i| ds[i]).collect();
        collection.insert(Series::new(id, timestamps, columns)?)?;
    }

    debug!(
        series = collection.len(),
        rows = collection.total_rows(),
        "validated input frame"
    );
    Ok(collection)
}

/// Reject names that collide with reserved names or existing components.
pub fn validate_column_name(name: &str, taken: &[String]) -> Result<()> {
    if name.is_empty() {
        return Err(ForecastError::Validation(
            "component name must not be empty".to_string(),
        ));
    }
    if name == SINGLE_SERIES_ID {
        return Err(ForecastError::Validation(format!(
            "name '{name}' is reserved"
        )));
    }
    if RESERVED_NAMES.contains(&name) || RESERVED_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return Err(ForecastError::Validation(format!(
            "name '{name}' is reserved"
        )));
    }
    if taken.iter().any(|t| t == name) {
        return Err(ForecastError::Validation(format!(
            "name '{name}' is already used by another component"
        )));
    }
    Ok(())
}

//! Event indicator columns and their window offsets.

use crate::core::{EventTable, TimeFrame};
use crate::error::{ForecastError, Result};
use crate::features::FeatureMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A registered event with an optional window of surrounding days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSpec {
    pub name: String,
    /// Rows before the event that are also affected (`<= 0`).
    pub lower_window: i64,
    /// Rows after the event that are also affected (`>= 0`).
    pub upper_window: i64,
    pub mode: FeatureMode,
}

impl EventSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lower_window: 0,
            upper_window: 0,
            mode: FeatureMode::Additive,
        }
    }

    pub fn with_window(mut self, lower_window: i64, upper_window: i64) -> Result<Self> {
        if lower_window > 0 || upper_window < 0 {
            return Err(ForecastError::InvalidParameter(format!(
                "event '{}' needs lower_window <= 0 <= upper_window",
                self.name
            )));
        }
        self.lower_window = lower_window;
        self.upper_window = upper_window;
        Ok(self)
    }

    pub fn with_mode(mut self, mode: FeatureMode) -> Self {
        self.mode = mode;
        self
    }

    /// Offsets covered by the window, in ascending order.
    pub fn offsets(&self) -> impl Iterator<Item = i64> {
        self.lower_window..=self.upper_window
    }

    /// Feature names, one per offset.
    pub fn feature_names(&self) -> Vec<String> {
        self.offsets().map(|o| offset_name(&self.name, o)).collect()
    }
}

/// Name of the feature for `event` shifted by `offset` rows.
pub fn offset_name(event: &str, offset: i64) -> String {
    match offset {
        0 => event.to_string(),
        o if o > 0 => format!("{event}_+{o}"),
        o => format!("{event}_-{}", -o),
    }
}

/// Value of the event indicator shifted by `offset` rows at `row`.
///
/// A positive offset flags rows after an occurrence. Out-of-range lookups are 0.
pub fn shifted_indicator(indicator: &[f64], row: usize, offset: i64) -> f64 {
    let source = row as i64 - offset;
    if source < 0 {
        return 0.0;
    }
    indicator.get(source as usize).copied().unwrap_or(0.0)
}

/// Add one 0/1 column per registered event.
///
/// Occurrences bound to a series flag only that series' rows; unbound
/// occurrences flag every series. Fails with `AuxiliaryMismatch` if the table
/// references a series missing from `frame`, and with `Validation` if it names
/// an unregistered event.
pub fn create_df_with_events(
    frame: &TimeFrame,
    events: &EventTable,
    specs: &[EventSpec],
) -> Result<TimeFrame> {
    let registered: BTreeSet<&str> = specs.iter().map(|s| s.name.as_str()).collect();
    if let Some(unknown) = events.iter().find(|e| !registered.contains(e.event.as_str())) {
        return Err(ForecastError::Validation(format!(
            "event '{}' has not been registered",
            unknown.event
        )));
    }
    if events.has_ids() {
        let known: BTreeSet<String> = frame.distinct_ids().into_iter().collect();
        if let Some(missing) = events.distinct_ids().iter().find(|id| !known.contains(*id)) {
            return Err(ForecastError::AuxiliaryMismatch(format!(
                "events reference series '{missing}' which is not in the data"
            )));
        }
    }

    let mut out = frame.clone();
    for spec in specs {
        let values = (0..frame.len())
            .map(|i| {
                let hit = events.for_id(frame.id_at(i)).any(|e| {
                    e.event == spec.name && e.ds == frame.timestamps()[i]
                });
                let previous = frame.column(&spec.name).map_or(0.0, |c| {
                    if c[i].is_nan() {
                        0.0
                    } else {
                        c[i]
                    }
                });
                if hit {
                    1.0
                } else {
                    previous
                }
            })
            .collect();
        out.set_column(spec.name.clone(), values)?;
    }
    Ok(out)
}

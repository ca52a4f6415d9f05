//! Multi-series input handling: merging inputs into one long frame, checking
//! identifiers across calls and restoring the caller's input shape.

use crate::core::{
    EventTable, InputShape, RegressorTable, SeriesCollection, SeriesInput, TimeFrame,
    SINGLE_SERIES_ID,
};
use crate::error::{ForecastError, Result};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Merge caller input into one long frame and remember its shape.
///
/// A frame without identifiers is a single series; a frame with an `ID`
/// column or a map of frames is a collection. Map keys override any `ID`
/// column inside the tables.
pub fn prep_input(input: SeriesInput) -> Result<(TimeFrame, InputShape)> {
    match input {
        SeriesInput::Frame(frame) if frame.has_ids() => Ok((frame, InputShape::Collection)),
        SeriesInput::Frame(frame) => Ok((frame, InputShape::Single)),
        SeriesInput::Map(map) => {
            if map.is_empty() {
                return Err(ForecastError::EmptyData);
            }
            Ok((merge_frames(map)?, InputShape::Collection))
        }
    }
}

/// Stack frames keyed by identifier into one frame with an `ID` column.
pub fn merge_frames(map: BTreeMap<String, TimeFrame>) -> Result<TimeFrame> {
    let tagged: Vec<TimeFrame> = map
        .into_iter()
        .map(|(id, frame)| frame.without_ids().with_id(id))
        .collect();
    debug!(series = tagged.len(), "merging keyed frames");
    TimeFrame::concat(&tagged)
}

/// Split a long frame back into one frame per identifier.
pub fn split_frame(frame: &TimeFrame) -> BTreeMap<String, TimeFrame> {
    frame
        .distinct_ids()
        .into_iter()
        .map(|id| {
            let part = frame.for_id(&id);
            (id, part)
        })
        .collect()
}

/// Convert an output frame to the caller's shape.
///
/// Single-series output loses its `ID` column.
pub fn restore_shape(frame: TimeFrame, shape: InputShape) -> TimeFrame {
    match shape {
        InputShape::Single => frame.without_ids(),
        InputShape::Collection if frame.has_ids() => frame,
        InputShape::Collection => frame.with_id(SINGLE_SERIES_ID),
    }
}

/// Fail with `UnknownSeries` for the first identifier not in `known`.
pub fn check_known_ids<'a>(
    ids: impl IntoIterator<Item = &'a str>,
    known: &BTreeSet<String>,
) -> Result<()> {
    for id in ids {
        if !known.contains(id) {
            return Err(ForecastError::UnknownSeries(id.to_string()));
        }
    }
    Ok(())
}

/// Validation data must cover exactly the training series.
pub fn check_validation_ids(train: &SeriesCollection, val: &SeriesCollection) -> Result<()> {
    let known: BTreeSet<String> = train.ids().map(str::to_string).collect();
    check_known_ids(val.ids(), &known)
}

/// Check that an event table only references series in `ids`.
pub fn check_event_ids(events: &EventTable, ids: &BTreeSet<String>) -> Result<()> {
    match events.distinct_ids().iter().find(|id| !ids.contains(*id)) {
        Some(id) => Err(ForecastError::AuxiliaryMismatch(format!(
            "events reference series '{id}' which is not in the data"
        ))),
        None => Ok(()),
    }
}

/// Check that a regressor table only references series in `ids`.
pub fn check_regressor_ids(table: &RegressorTable, ids: &BTreeSet<String>) -> Result<()> {
    match table.distinct_ids().iter().find(|id| !ids.contains(*id)) {
        Some(id) => Err(ForecastError::AuxiliaryMismatch(format!(
            "regressors reference series '{id}' which is not in the data"
        ))),
        None => Ok(()),
    }
}

/// Check that a regressor table holds `periods` rows of every column in
/// `required` for every series in `ids`.
///
/// A table without identifiers applies to every series.
pub fn check_regressor_table(
    table: &RegressorTable,
    required: &[String],
    ids: &BTreeSet<String>,
    periods: usize,
) -> Result<()> {
    let present: BTreeSet<&str> = table.column_names().collect();
    if let Some(missing) = required.iter().find(|r| !present.contains(r.as_str())) {
        return Err(ForecastError::AuxiliaryMismatch(format!(
            "future values of regressor '{missing}' are missing"
        )));
    }
    check_regressor_ids(table, ids)?;
    for id in ids {
        let rows = table.for_id(id).values().next().map_or(0, Vec::len);
        if rows != periods {
            return Err(ForecastError::AuxiliaryMismatch(format!(
                "series '{id}' needs {periods} future regressor rows, got {rows}"
            )));
        }
    }
    Ok(())
}

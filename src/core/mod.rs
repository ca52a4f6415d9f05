//! Core data structures for multi-series forecasting.

mod forecast;
mod frame;
mod frequency;
mod series;
mod validation;

pub use forecast::{
    quantile_column, yhat_column, ForecastRow, ForecastTable, LatestForecast, LatestRow,
    RawForecast, RawRow, SeriesPredictions,
};
pub use frame::{
    parse_timestamp, EventOccurrence, EventTable, InputShape, RegressorTable, SeriesInput,
    TimeFrame, ID_COLUMN, SINGLE_SERIES_ID, TARGET_COLUMN, TIME_COLUMN,
};
pub use frequency::Frequency;
pub use series::{Series, SeriesCollection};
pub use validation::{check_dataframe, validate_column_name, CheckOptions};

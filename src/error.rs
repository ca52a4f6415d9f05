//! Error types for the anofox-neural library.

use thiserror::Error;

/// Result type alias for forecasting operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Errors that can occur while preparing data, fitting or predicting.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// Input data is empty.
    #[error("empty input data")]
    EmptyData,

    /// Insufficient data points for the operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Dimension mismatch between data structures.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Malformed tabular input.
    #[error("validation error: {0}")]
    Validation(String),

    /// A required column is absent.
    #[error("missing column: {0}")]
    MissingColumn(String),

    /// Timestamp-related error (duplicates, parse failures, ordering).
    #[error("timestamp error: {0}")]
    TimestampError(String),

    /// Missing values remain after imputation.
    #[error("missing data in column '{column}': {count} unresolved values")]
    MissingData { column: String, count: usize },

    /// Frequency inference failed or the declared frequency does not fit the data.
    #[error("could not infer frequency: {0}")]
    FrequencyInference(String),

    /// A series identifier was not seen at fit time.
    #[error("unknown series '{0}': not present at fit time")]
    UnknownSeries(String),

    /// Auxiliary inputs (regressors, events, validation data) do not line up with the series.
    #[error("auxiliary data mismatch: {0}")]
    AuxiliaryMismatch(String),

    /// Incompatible configuration values.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The model instance was already fitted.
    #[error("model has already been fitted; create a new instance to refit")]
    AlreadyFitted,

    /// Model has not been fitted yet.
    #[error("model must be fitted before prediction")]
    FitRequired,

    /// Folds cannot be reassembled with the requested count.
    #[error("fold count mismatch: expected {expected}, got {got}")]
    FoldCountMismatch { expected: usize, got: usize },

    /// Computation error (e.g., numerical issues).
    #[error("computation error: {0}")]
    ComputationError(String),
}

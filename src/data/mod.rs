//! Data preparation: imputation, normalization, windowing, splitting and
//! multi-series coordination.

pub mod coordinator;
pub mod missing;
pub mod normalization;
pub mod split;
pub mod windowing;

pub use coordinator::{
    check_event_ids, check_known_ids, check_regressor_ids, check_regressor_table,
    check_validation_ids, merge_frames, prep_input, restore_shape, split_frame,
};
pub use missing::{handle_missing, regularize, ImputeColumns, ImputeConfig};
pub use normalization::{
    NormOptions, NormalizationParams, NormalizeMode, ScaleParams, ShiftScale, TimeScale,
    TIME_FEATURE,
};
pub use split::{
    crossvalidation_split_collection, crossvalidation_split_series,
    find_valid_time_interval_for_cv, split_collection, split_series, unfold_dict_of_folds, Fold,
    FoldConfig, GlobalCvType, ValidSize,
};
pub use windowing::{
    expected_window_count, LaggedCovariate, PredictionFrequency, Window, WindowConfig,
    WindowMode, WindowSet,
};

//! Calendar and event features.
//!
//! # Example
//!
//! ```
//! use anofox_neural::features::fourier_terms;
//!
//! // Two orders of weekly seasonality at day 3.5 of the cycle
//! let terms = fourier_terms(3.5, 7.0, 2);
//! assert_eq!(terms.len(), 4);
//! ```

pub mod conditions;
pub mod events;
pub mod seasonality;

pub use conditions::{add_quarter_condition, add_weekday_condition};
pub use events::{create_df_with_events, offset_name, shifted_indicator, EventSpec};
pub use seasonality::{
    days_since_epoch, fourier_terms, resolve_seasonalities, BuiltinSeasonality, FeatureMode,
    SeasonalityComponent, SeasonalityToggle,
};

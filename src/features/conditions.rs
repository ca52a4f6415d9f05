//! Condition columns for conditional seasonality.
//!
//! Each helper adds 0/1 indicator columns that can gate a custom seasonality
//! via [`SeasonalityComponent::with_condition`](super::SeasonalityComponent::with_condition).

use crate::core::TimeFrame;
use crate::error::Result;
use chrono::{Datelike, Weekday};

/// Names of the quarter condition columns.
pub const QUARTER_CONDITIONS: [&str; 4] = ["summer", "winter", "spring", "fall"];
/// Names of the weekday condition columns.
pub const WEEKDAY_CONDITIONS: [&str; 2] = ["weekend", "weekday"];

fn indicator(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

/// Add `summer`, `winter`, `spring` and `fall` indicators (northern-hemisphere months).
pub fn add_quarter_condition(frame: TimeFrame) -> Result<TimeFrame> {
    let months: Vec<u32> = frame.timestamps().iter().map(|ts| ts.month()).collect();
    let season = |range: &[u32]| -> Vec<f64> {
        months.iter().map(|m| indicator(range.contains(m))).collect()
    };

    let summer = season(&[6, 7, 8]);
    let winter = season(&[12, 1, 2]);
    let spring = season(&[3, 4, 5]);
    let fall = season(&[9, 10, 11]);

    frame
        .with_column("summer", summer)?
        .with_column("winter", winter)?
        .with_column("spring", spring)?
        .with_column("fall", fall)
}

/// Add `weekend` and `weekday` indicators.
pub fn add_weekday_condition(frame: TimeFrame) -> Result<TimeFrame> {
    let weekend: Vec<f64> = frame
        .timestamps()
        .iter()
        .map(|ts| indicator(matches!(ts.weekday(), Weekday::Sat | Weekday::Sun)))
        .collect();
    let weekday = weekend.iter().map(|w| 1.0 - w).collect();

    frame.with_column("weekend", weekend)?.with_column("weekday", weekday)
}

//! Sampling frequency of a time series.
//!
//! Fixed frequencies are an exact number of seconds; calendar frequencies
//! (month/year start or end) step through the calendar and therefore have a
//! variable length in seconds.

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

const SECONDS_PER_DAY: i64 = 86_400;

/// Sampling frequency of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Frequency {
    /// Constant spacing, in seconds.
    Fixed(i64),
    /// First day of every `n` months.
    MonthStart(u32),
    /// Last day of every `n` months.
    MonthEnd(u32),
    /// January 1st of every `n` years.
    YearStart(u32),
    /// December 31st of every `n` years.
    YearEnd(u32),
}

impl Frequency {
    pub fn seconds(n: i64) -> Self {
        Self::Fixed(n)
    }

    pub fn minutes(n: i64) -> Self {
        Self::Fixed(n * 60)
    }

    pub fn hours(n: i64) -> Self {
        Self::Fixed(n * 3600)
    }

    pub fn days(n: i64) -> Self {
        Self::Fixed(n * SECONDS_PER_DAY)
    }

    /// Approximate length of one step in seconds.
    pub fn approx_seconds(&self) -> f64 {
        match *self {
            Self::Fixed(s) => s as f64,
            Self::MonthStart(n) | Self::MonthEnd(n) => n as f64 * 30.436875 * SECONDS_PER_DAY as f64,
            Self::YearStart(n) | Self::YearEnd(n) => n as f64 * 365.2425 * SECONDS_PER_DAY as f64,
        }
    }

    /// Approximate length of one step in days.
    pub fn approx_days(&self) -> f64 {
        self.approx_seconds() / SECONDS_PER_DAY as f64
    }

    /// Advance `ts` by `steps` periods (negative steps move backwards).
    pub fn advance(&self, ts: DateTime<Utc>, steps: i64) -> Result<DateTime<Utc>> {
        match *self {
            Self::Fixed(s) => Ok(ts + Duration::seconds(s * steps)),
            Self::MonthStart(n) => {
                let (y, m) = shift_month(ts.year(), ts.month(), steps * n as i64);
                with_date(ts, y, m, 1)
            }
            Self::MonthEnd(n) => {
                let (y, m) = shift_month(ts.year(), ts.month(), steps * n as i64);
                with_date(ts, y, m, days_in_month(y, m)?)
            }
            Self::YearStart(n) => with_date(ts, ts.year() + (steps * n as i64) as i32, 1, 1),
            Self::YearEnd(n) => with_date(ts, ts.year() + (steps * n as i64) as i32, 12, 31),
        }
    }

    /// Whether `ts` lies on the calendar anchor of this frequency.
    pub fn is_anchored(&self, ts: &DateTime<Utc>) -> bool {
        match *self {
            Self::Fixed(_) => true,
            Self::MonthStart(_) => ts.day() == 1,
            Self::MonthEnd(_) => days_in_month(ts.year(), ts.month())
                .map(|d| d == ts.day())
                .unwrap_or(false),
            Self::YearStart(_) => ts.month() == 1 && ts.day() == 1,
            Self::YearEnd(_) => ts.month() == 12 && ts.day() == 31,
        }
    }

    /// Number of whole periods from `from` to `to`, if `to` lies on the grid anchored at `from`.
    pub fn steps_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Option<i64> {
        match *self {
            Self::Fixed(s) => {
                if s <= 0 {
                    return None;
                }
                let diff = (to - from).num_seconds();
                (diff % s == 0).then_some(diff / s)
            }
            Self::MonthStart(n) | Self::MonthEnd(n) => {
                let months = (to.year() as i64 * 12 + to.month() as i64)
                    - (from.year() as i64 * 12 + from.month() as i64);
                if months % n as i64 != 0 {
                    return None;
                }
                let steps = months / n as i64;
                (self.advance(from, steps).ok()? == to).then_some(steps)
            }
            Self::YearStart(n) | Self::YearEnd(n) => {
                let years = (to.year() - from.year()) as i64;
                if years % n as i64 != 0 {
                    return None;
                }
                let steps = years / n as i64;
                (self.advance(from, steps).ok()? == to).then_some(steps)
            }
        }
    }

    /// Regular grid from `start` to `end` (inclusive).
    pub fn range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>> {
        if end < start {
            return Ok(Vec::new());
        }
        let steps = self.steps_between(start, end).ok_or_else(|| {
            ForecastError::FrequencyInference(format!(
                "{end} is not reachable from {start} with frequency {self}"
            ))
        })?;
        (0..=steps).map(|k| self.advance(start, k)).collect()
    }

    /// Fail unless every consecutive spacing is a positive whole number of periods.
    pub fn check_spacing(&self, timestamps: &[DateTime<Utc>]) -> Result<()> {
        for w in timestamps.windows(2) {
            match self.steps_between(w[0], w[1]) {
                Some(k) if k >= 1 => {}
                _ => {
                    return Err(ForecastError::FrequencyInference(format!(
                        "declared frequency {self} does not evenly divide the spacing between {} and {}",
                        w[0], w[1]
                    )))
                }
            }
        }
        Ok(())
    }

    /// Infer frequency from timestamps using the modal spacing.
    ///
    /// Monthly and yearly spacings anchored at month/year boundaries are
    /// recognised as calendar frequencies.
    pub fn infer(timestamps: &[DateTime<Utc>], tolerance: f64) -> Result<Self> {
        if timestamps.len() < 2 {
            return Err(ForecastError::InsufficientData {
                needed: 2,
                got: timestamps.len(),
            });
        }

        let diffs: Vec<i64> = timestamps
            .windows(2)
            .map(|w| (w[1] - w[0]).num_seconds())
            .collect();

        let mut counts: HashMap<i64, usize> = HashMap::new();
        for &diff in &diffs {
            *counts.entry(diff).or_insert(0) += 1;
        }

        // Calendar months and years have variable lengths; bucket them first.
        let all = |f: Frequency| timestamps.iter().all(|t| f.is_anchored(t));
        let monthly = diffs
            .iter()
            .filter(|&&d| (28 * SECONDS_PER_DAY..=31 * SECONDS_PER_DAY).contains(&d))
            .count();
        let yearly = diffs
            .iter()
            .filter(|&&d| (365 * SECONDS_PER_DAY..=366 * SECONDS_PER_DAY).contains(&d))
            .count();
        let total = diffs.len() as f64;

        if monthly as f64 / total >= tolerance {
            if all(Self::MonthStart(1)) {
                return Ok(Self::MonthStart(1));
            }
            if all(Self::MonthEnd(1)) {
                return Ok(Self::MonthEnd(1));
            }
        }
        if yearly as f64 / total >= tolerance {
            if all(Self::YearStart(1)) {
                return Ok(Self::YearStart(1));
            }
            if all(Self::YearEnd(1)) {
                return Ok(Self::YearEnd(1));
            }
        }

        let (modal_diff, modal_count) = counts
            .iter()
            .max_by_key(|(&diff, &count)| (count, std::cmp::Reverse(diff)))
            .map(|(&diff, &count)| (diff, count))
            .ok_or_else(|| ForecastError::FrequencyInference("empty spacing data".to_string()))?;

        if modal_diff <= 0 {
            return Err(ForecastError::FrequencyInference(
                "timestamps are not strictly increasing".to_string(),
            ));
        }
        if (modal_count as f64 / total) < tolerance {
            return Err(ForecastError::FrequencyInference(
                "no unique modal spacing found".to_string(),
            ));
        }

        Ok(Self::Fixed(modal_diff))
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let multiplier = |n: i64| if n == 1 { String::new() } else { n.to_string() };
        match *self {
            Self::Fixed(s) if s % (7 * SECONDS_PER_DAY) == 0 && s >= 7 * SECONDS_PER_DAY => {
                write!(f, "{}W", multiplier(s / (7 * SECONDS_PER_DAY)))
            }
            Self::Fixed(s) if s % SECONDS_PER_DAY == 0 && s > 0 => {
                write!(f, "{}D", multiplier(s / SECONDS_PER_DAY))
            }
            Self::Fixed(s) if s % 3600 == 0 && s > 0 => write!(f, "{}H", multiplier(s / 3600)),
            Self::Fixed(s) if s % 60 == 0 && s > 0 => write!(f, "{}min", multiplier(s / 60)),
            Self::Fixed(s) => write!(f, "{}S", multiplier(s)),
            Self::MonthStart(n) => write!(f, "{}MS", multiplier(n as i64)),
            Self::MonthEnd(n) => write!(f, "{}M", multiplier(n as i64)),
            Self::YearStart(n) => write!(f, "{}YS", multiplier(n as i64)),
            Self::YearEnd(n) => write!(f, "{}Y", multiplier(n as i64)),
        }
    }
}

impl FromStr for Frequency {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (digits, unit) = s.split_at(split);
        let n: i64 = if digits.is_empty() {
            1
        } else {
            digits
                .parse()
                .map_err(|_| ForecastError::InvalidParameter(format!("bad frequency '{s}'")))?
        };
        if n <= 0 {
            return Err(ForecastError::InvalidParameter(format!(
                "frequency multiplier must be positive: '{s}'"
            )));
        }
        let calendar = |n: i64| n as u32;

        match unit {
            "S" | "s" => Ok(Self::Fixed(n)),
            "min" | "T" => Ok(Self::Fixed(n * 60)),
            "H" | "h" => Ok(Self::Fixed(n * 3600)),
            "D" | "d" => Ok(Self::Fixed(n * SECONDS_PER_DAY)),
            "W" => Ok(Self::Fixed(n * 7 * SECONDS_PER_DAY)),
            "MS" => Ok(Self::MonthStart(calendar(n))),
            "M" | "ME" => Ok(Self::MonthEnd(calendar(n))),
            "YS" | "AS" => Ok(Self::YearStart(calendar(n))),
            "Y" | "A" | "YE" => Ok(Self::YearEnd(calendar(n))),
            _ => Err(ForecastError::InvalidParameter(format!(
                "unknown frequency '{s}'"
            ))),
        }
    }
}

impl TryFrom<String> for Frequency {
    type Error = ForecastError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Frequency> for String {
    fn from(value: Frequency) -> Self {
        value.to_string()
    }
}

fn shift_month(year: i32, month: u32, months: i64) -> (i32, u32) {
    let total = year as i64 * 12 + (month as i64 - 1) + months;
    (total.div_euclid(12) as i32, (total.rem_euclid(12) + 1) as u32)
}

fn days_in_month(year: i32, month: u32) -> Result<u32> {
    let (ny, nm) = shift_month(year, month, 1);
    let first_next = NaiveDate::from_ymd_opt(ny, nm, 1)
        .ok_or_else(|| ForecastError::TimestampError(format!("invalid date {ny}-{nm}-01")))?;
    Ok(first_next.pred_opt().map(|d| d.day()).unwrap_or(28))
}

fn with_date(ts: DateTime<Utc>, year: i32, month: u32, day: u32) -> Result<DateTime<Utc>> {
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        ForecastError::TimestampError(format!("invalid date {year}-{month}-{day}"))
    })?;
    Ok(Utc.from_utc_datetime(&date.and_time(ts.time())))
}

//! Fourier seasonality terms and automatic seasonality selection.

use crate::core::Frequency;
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Default yearly period in days.
pub const YEARLY_PERIOD: f64 = 365.25;
/// Default weekly period in days.
pub const WEEKLY_PERIOD: f64 = 7.0;
/// Default daily period in days.
pub const DAILY_PERIOD: f64 = 1.0;

const YEARLY_ORDER: usize = 6;
const WEEKLY_ORDER: usize = 3;
const DAILY_ORDER: usize = 6;

/// Whether a built-in seasonality is modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalityToggle {
    /// Decide from the span and sampling of the fit data.
    #[default]
    Auto,
    /// Always on with the default Fourier order.
    On,
    Off,
    /// Always on with this Fourier order.
    Order(usize),
}

/// How seasonal and regressor effects combine with the trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureMode {
    #[default]
    Additive,
    /// Scaled by the trend.
    Multiplicative,
}

/// One modelled seasonality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalityComponent {
    pub name: String,
    /// Period in days.
    pub period: f64,
    pub fourier_order: usize,
    /// Column whose value (0 or 1) gates the seasonality.
    pub condition: Option<String>,
}

impl SeasonalityComponent {
    pub fn new(name: impl Into<String>, period: f64, fourier_order: usize) -> Result<Self> {
        if period.is_nan() || period <= 0.0 {
            return Err(ForecastError::InvalidParameter(
                "seasonality period must be positive".to_string(),
            ));
        }
        if fourier_order == 0 {
            return Err(ForecastError::InvalidParameter(
                "fourier order must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            name: name.into(),
            period,
            fourier_order,
            condition: None,
        })
    }

    pub fn with_condition(mut self, column: impl Into<String>) -> Self {
        self.condition = Some(column.into());
        self
    }

    /// Number of features (one sine and one cosine per order).
    pub fn width(&self) -> usize {
        2 * self.fourier_order
    }

    /// Fourier terms at `ts`, scaled by the condition value.
    pub fn features(&self, ts: &DateTime<Utc>, condition: f64) -> Vec<f64> {
        fourier_terms(days_since_epoch(ts), self.period, self.fourier_order)
            .into_iter()
            .map(|v| v * condition)
            .collect()
    }
}

/// Days elapsed since the Unix epoch.
pub fn days_since_epoch(ts: &DateTime<Utc>) -> f64 {
    ts.timestamp() as f64 / 86_400.0
}

/// Interleaved `sin, cos` terms for orders `1..=order`.
pub fn fourier_terms(t_days: f64, period: f64, order: usize) -> Vec<f64> {
    (1..=order)
        .flat_map(|k| {
            let x = 2.0 * PI * k as f64 * t_days / period;
            [x.sin(), x.cos()]
        })
        .collect()
}

/// Built-in seasonality toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuiltinSeasonality {
    pub yearly: SeasonalityToggle,
    pub weekly: SeasonalityToggle,
    pub daily: SeasonalityToggle,
}

/// Resolve the built-in seasonalities for data spanning `first..=last` at `frequency`.
///
/// `Auto` enables yearly seasonality with at least two years of data, weekly
/// with at least two weeks of sub-weekly data and daily with at least two days
/// of sub-daily data.
pub fn resolve_seasonalities(
    toggles: BuiltinSeasonality,
    first: DateTime<Utc>,
    last: DateTime<Utc>,
    frequency: Frequency,
) -> Vec<SeasonalityComponent> {
    let span_days = (last - first).num_seconds() as f64 / 86_400.0;
    let step_days = frequency.approx_days();

    let resolve = |toggle: SeasonalityToggle, default: usize, auto: bool| match toggle {
        SeasonalityToggle::Auto if auto => Some(default),
        SeasonalityToggle::Auto | SeasonalityToggle::Off => None,
        SeasonalityToggle::On => Some(default),
        SeasonalityToggle::Order(0) => None,
        SeasonalityToggle::Order(n) => Some(n),
    };

    let candidates = [
        (
            "yearly",
            YEARLY_PERIOD,
            resolve(toggles.yearly, YEARLY_ORDER, span_days >= 2.0 * YEARLY_PERIOD - 0.5),
        ),
        (
            "weekly",
            WEEKLY_PERIOD,
            resolve(
                toggles.weekly,
                WEEKLY_ORDER,
                span_days >= 2.0 * WEEKLY_PERIOD && step_days < WEEKLY_PERIOD,
            ),
        ),
        (
            "daily",
            DAILY_PERIOD,
            resolve(
                toggles.daily,
                DAILY_ORDER,
                span_days >= 2.0 * DAILY_PERIOD && step_days < DAILY_PERIOD,
            ),
        ),
    ];

    candidates
        .into_iter()
        .filter_map(|(name, period, order)| {
            order.map(|fourier_order| SeasonalityComponent {
                name: name.to_string(),
                period,
                fourier_order,
                condition: None,
            })
        })
        .collect()
}

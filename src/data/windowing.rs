//! Fixed-size (lag, horizon) samples.
//!
//! A window whose first target sits at row `i` reads the `n_lags` target values
//! before `i` and the next `n_forecasts` rows as labels. Its origin is the
//! timestamp of row `i - 1`, the last lag.

use crate::core::{Series, TARGET_COLUMN};
use crate::data::normalization::TIME_FEATURE;
use crate::error::{ForecastError, Result};
use crate::features::{shifted_indicator, EventSpec, SeasonalityComponent};
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Calendar rule restricting which origins may emit windows.
///
/// Every set field must match; an empty rule lets every origin through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PredictionFrequency {
    /// Hour of day (0-23).
    pub daily_hour: Option<u32>,
    /// Day of week, Monday = 0.
    pub weekly_day: Option<u32>,
    /// Day of month (1-31).
    pub monthly_day: Option<u32>,
    /// Month of year (1-12).
    pub yearly_month: Option<u32>,
    /// Minute of hour (0-59).
    pub hourly_minute: Option<u32>,
}

impl PredictionFrequency {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        let check = |value: Option<u32>, range: std::ops::RangeInclusive<u32>, key: &str| {
            match value {
                Some(v) if !range.contains(&v) => Err(ForecastError::Configuration(format!(
                    "prediction frequency '{key}' must be in {}..={}, got {v}",
                    range.start(),
                    range.end()
                ))),
                _ => Ok(()),
            }
        };
        check(self.daily_hour, 0..=23, "daily-hour")?;
        check(self.weekly_day, 0..=6, "weekly-day")?;
        check(self.monthly_day, 1..=31, "monthly-day")?;
        check(self.yearly_month, 1..=12, "yearly-month")?;
        check(self.hourly_minute, 0..=59, "hourly-minute")
    }

    /// Whether `ts` satisfies every set predicate.
    pub fn matches(&self, ts: &DateTime<Utc>) -> bool {
        let ok = |want: Option<u32>, got: u32| want.map_or(true, |w| w == got);
        ok(self.daily_hour, ts.hour())
            && ok(self.weekly_day, ts.weekday().num_days_from_monday())
            && ok(self.monthly_day, ts.day())
            && ok(self.yearly_month, ts.month())
            && ok(self.hourly_minute, ts.minute())
    }
}

/// A covariate fed to the model through its own lags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaggedCovariate {
    pub name: String,
    pub n_lags: usize,
}

/// Shape of the windows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WindowConfig {
    pub n_lags: usize,
    pub n_forecasts: usize,
    pub lagged: Vec<LaggedCovariate>,
    pub future_regressors: Vec<String>,
    pub events: Vec<EventSpec>,
    pub seasonalities: Vec<SeasonalityComponent>,
    pub prediction_frequency: PredictionFrequency,
}

impl WindowConfig {
    /// Rows of history a window needs before its first target.
    pub fn max_lags(&self) -> usize {
        self.lagged
            .iter()
            .map(|c| c.n_lags)
            .fold(self.n_lags, usize::max)
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_forecasts == 0 {
            return Err(ForecastError::Configuration(
                "n_forecasts must be at least 1".to_string(),
            ));
        }
        for c in &self.lagged {
            if c.n_lags == 0 {
                return Err(ForecastError::Configuration(format!(
                    "lagged regressor '{}' needs at least one lag",
                    c.name
                )));
            }
            if self.n_lags == 0 {
                return Err(ForecastError::Configuration(format!(
                    "lagged regressor '{}' requires n_lags > 0",
                    c.name
                )));
            }
        }
        self.prediction_frequency.validate()
    }

    /// Event feature names in model order.
    pub fn event_features(&self) -> Vec<String> {
        self.events.iter().flat_map(EventSpec::feature_names).collect()
    }
}

/// Whether labels must be known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    /// Every lag and label is known.
    Train,
    /// Labels may be unknown future values; the rows must exist.
    Predict,
}

/// One sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub id: String,
    /// Row of the first target.
    pub target_start: usize,
    /// Timestamp of the last lag row, if any.
    pub origin: Option<DateTime<Utc>>,
    pub lags: Vec<f64>,
    /// `[covariate][lag]`, aligned with [`WindowConfig::lagged`].
    pub covariates: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
    /// Normalized time of each target row.
    pub time: Vec<f64>,
    /// `[component][step][term]`.
    pub seasonal: Vec<Vec<Vec<f64>>>,
    /// `[regressor][step]`.
    pub regressors: Vec<Vec<f64>>,
    /// `[event feature][step]`.
    pub events: Vec<Vec<f64>>,
}

struct Columns<'a> {
    y: &'a [f64],
    t: &'a [f64],
    covariates: Vec<&'a [f64]>,
    regressors: Vec<&'a [f64]>,
    events: Vec<&'a [f64]>,
    conditions: Vec<Option<&'a [f64]>>,
}

impl<'a> Columns<'a> {
    fn resolve(series: &'a Series, config: &WindowConfig) -> Result<Self> {
        Ok(Self {
            y: series.column(TARGET_COLUMN)?,
            t: series.column(TIME_FEATURE)?,
            covariates: config
                .lagged
                .iter()
                .map(|c| series.column(&c.name))
                .collect::<Result<_>>()?,
            regressors: config
                .future_regressors
                .iter()
                .map(|r| series.column(r))
                .collect::<Result<_>>()?,
            events: config
                .events
                .iter()
                .map(|e| series.column(&e.name))
                .collect::<Result<_>>()?,
            conditions: config
                .seasonalities
                .iter()
                .map(|s| s.condition.as_deref().map(|c| series.column(c)).transpose())
                .collect::<Result<_>>()?,
        })
    }
}

/// Lazy, restartable set of windows over one series.
pub struct WindowSet<'a> {
    series: &'a Series,
    config: &'a WindowConfig,
    columns: Columns<'a>,
    starts: Vec<usize>,
}

impl<'a> WindowSet<'a> {
    /// Find every eligible window of `series` without building features.
    ///
    /// In `Predict` mode a future regressor missing at a target row fails with
    /// `AuxiliaryMismatch`.
    pub fn new(series: &'a Series, config: &'a WindowConfig, mode: WindowMode) -> Result<Self> {
        config.validate()?;
        let columns = Columns::resolve(series, config)?;
        let max_lags = config.max_lags();
        let horizon = config.n_forecasts;
        let len = series.len();
        let ts = series.timestamps();

        let mut starts = Vec::new();
        if len >= max_lags + horizon {
            for i in max_lags..=len - horizon {
                if !series.is_contiguous(i - max_lags, i + horizon) {
                    continue;
                }
                if !config.prediction_frequency.is_empty() {
                    let origin_ok = i
                        .checked_sub(1)
                        .map_or(false, |o| config.prediction_frequency.matches(&ts[o]));
                    if !origin_ok {
                        continue;
                    }
                }
                let history_known = columns.y[i - config.n_lags..i].iter().all(|v| !v.is_nan())
                    && config
                        .lagged
                        .iter()
                        .zip(&columns.covariates)
                        .all(|(c, x)| x[i - c.n_lags..i].iter().all(|v| !v.is_nan()));
                if !history_known {
                    continue;
                }
                let targets = i..i + horizon;
                if mode == WindowMode::Train && columns.y[targets.clone()].iter().any(|v| v.is_nan())
                {
                    continue;
                }
                let regressors_known = columns
                    .regressors
                    .iter()
                    .all(|r| r[targets.clone()].iter().all(|v| !v.is_nan()));
                if !regressors_known {
                    if mode == WindowMode::Predict {
                        return Err(ForecastError::AuxiliaryMismatch(format!(
                            "series '{}' lacks future regressor values at {}",
                            series.id(),
                            ts[i]
                        )));
                    }
                    continue;
                }
                starts.push(i);
            }
        }

        Ok(Self {
            series,
            config,
            columns,
            starts,
        })
    }

    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    pub fn series(&self) -> &Series {
        self.series
    }

    /// First-target rows of the windows, ascending.
    pub fn target_starts(&self) -> &[usize] {
        &self.starts
    }

    /// Build the `k`-th window.
    pub fn get(&self, k: usize) -> Option<Window> {
        self.starts.get(k).map(|&i| self.build(i))
    }

    /// Iterate over all windows; every call starts over.
    pub fn iter(&self) -> impl Iterator<Item = Window> + '_ {
        self.starts.iter().map(move |&i| self.build(i))
    }

    fn build(&self, i: usize) -> Window {
        let cfg = self.config;
        let cols = &self.columns;
        let ts = self.series.timestamps();
        let steps = i..i + cfg.n_forecasts;

        let seasonal = cfg
            .seasonalities
            .iter()
            .zip(&cols.conditions)
            .map(|(comp, cond)| {
                steps
                    .clone()
                    .map(|r| {
                        let gate = cond.map_or(1.0, |c| if c[r].is_nan() { 0.0 } else { c[r] });
                        comp.features(&ts[r], gate)
                    })
                    .collect()
            })
            .collect();

        let events = cfg
            .events
            .iter()
            .zip(&cols.events)
            .flat_map(|(spec, indicator)| {
                let steps = steps.clone();
                spec.offsets().map(move |offset| {
                    steps
                        .clone()
                        .map(|r| shifted_indicator(indicator, r, offset))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        Window {
            id: self.series.id().to_string(),
            target_start: i,
            origin: i.checked_sub(1).map(|o| ts[o]),
            lags: cols.y[i - cfg.n_lags..i].to_vec(),
            covariates: cfg
                .lagged
                .iter()
                .zip(&cols.covariates)
                .map(|(c, x)| x[i - c.n_lags..i].to_vec())
                .collect(),
            targets: cols.y[steps.clone()].to_vec(),
            time: cols.t[steps.clone()].to_vec(),
            seasonal,
            regressors: cols.regressors.iter().map(|r| r[steps.clone()].to_vec()).collect(),
            events,
        }
    }
}

/// Number of windows complete data of length `len` yields.
pub fn expected_window_count(len: usize, max_lags: usize, n_forecasts: usize) -> usize {
    (len + 1).saturating_sub(max_lags + n_forecasts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn hours(n: usize) -> Vec<DateTime<Utc>> {
        // 2024-01-01 is a Monday
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n).map(|i| base + Duration::hours(i as i64)).collect()
    }

    fn series(n: usize) -> Series {
        let mut s = Series::univariate("a", hours(n), (0..n).map(|x| x as f64).collect()).unwrap();
        s.set_column(TIME_FEATURE, (0..n).map(|x| x as f64 / n as f64).collect())
            .unwrap();
        s
    }

    fn config(n_lags: usize, n_forecasts: usize) -> WindowConfig {
        WindowConfig {
            n_lags,
            n_forecasts,
            ..Default::default()
        }
    }

    #[test]
    fn counts_windows_on_complete_data() {
        let s = series(20);
        let cfg = config(3, 2);
        let set = WindowSet::new(&s, &cfg, WindowMode::Train).unwrap();

        assert_eq!(set.len(), 20 - 3 - 2 + 1);
        assert_eq!(set.len(), expected_window_count(20, 3, 2));
        assert_eq!(set.iter().count(), set.len());
    }

    #[test]
    fn window_contents_line_up() {
        let s = series(10);
        let cfg = config(3, 2);
        let set = WindowSet::new(&s, &cfg, WindowMode::Train).unwrap();
        let w = set.get(0).unwrap();

        assert_eq!(w.target_start, 3);
        assert_eq!(w.lags, vec![0.0, 1.0, 2.0]);
        assert_eq!(w.targets, vec![3.0, 4.0]);
        assert_eq!(w.origin, Some(s.timestamps()[2]));

        let last = set.get(set.len() - 1).unwrap();
        assert_eq!(last.targets, vec![8.0, 9.0]);
    }

    #[test]
    fn iteration_is_restartable() {
        let s = series(8);
        let cfg = config(2, 1);
        let set = WindowSet::new(&s, &cfg, WindowMode::Train).unwrap();
        let first: Vec<_> = set.iter().map(|w| w.target_start).collect();
        let second: Vec<_> = set.iter().map(|w| w.target_start).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn covariate_lags_widen_history() {
        let mut s = series(10);
        s.set_column("x", (0..10).map(|v| 100.0 + v as f64).collect())
            .unwrap();
        let cfg = WindowConfig {
            lagged: vec![LaggedCovariate {
                name: "x".to_string(),
                n_lags: 4,
            }],
            ..config(2, 1)
        };
        let set = WindowSet::new(&s, &cfg, WindowMode::Train).unwrap();
        let w = set.get(0).unwrap();

        assert_eq!(set.len(), 10 - 4 - 1 + 1);
        assert_eq!(w.target_start, 4);
        assert_eq!(w.lags, vec![2.0, 3.0]);
        assert_eq!(w.covariates[0], vec![100.0, 101.0, 102.0, 103.0]);
    }

    #[test]
    fn lagged_covariates_need_autoregression() {
        let s = series(10);
        let cfg = WindowConfig {
            lagged: vec![LaggedCovariate {
                name: "x".to_string(),
                n_lags: 1,
            }],
            ..config(0, 1)
        };
        assert!(matches!(
            WindowSet::new(&s, &cfg, WindowMode::Train),
            Err(ForecastError::Configuration(_))
        ));
    }

    #[test]
    fn windows_never_span_breaks() {
        let s = series(12).select_rows(&[0, 1, 2, 3, 4, 5, 7, 8, 9, 10, 11]);
        let cfg = config(2, 1);
        let set = WindowSet::new(&s, &cfg, WindowMode::Train).unwrap();

        // segments of 6 and 5 rows yield 4 and 3 windows
        assert_eq!(set.len(), 7);
        for w in set.iter() {
            let start = w.target_start - 2;
            assert!(s.is_contiguous(start, w.target_start + 1));
        }
    }

    #[test]
    fn prediction_frequency_filters_origins() {
        let s = series(24 * 14);
        let cfg = WindowConfig {
            prediction_frequency: PredictionFrequency {
                daily_hour: Some(7),
                weekly_day: Some(2),
                ..Default::default()
            },
            ..config(3, 2)
        };
        let set = WindowSet::new(&s, &cfg, WindowMode::Train).unwrap();

        assert_eq!(set.len(), 2);
        for w in set.iter() {
            let origin = w.origin.unwrap();
            assert_eq!(origin.hour(), 7);
            assert_eq!(origin.weekday().num_days_from_monday(), 2);
        }
    }

    #[test]
    fn lag_free_windows_carry_every_horizon() {
        let s = series(24 * 14);
        let cfg = WindowConfig {
            prediction_frequency: PredictionFrequency {
                weekly_day: Some(4),
                ..Default::default()
            },
            ..config(0, 14)
        };
        let set = WindowSet::new(&s, &cfg, WindowMode::Train).unwrap();

        // every hour of Fridays 5th and 12th
        assert_eq!(set.len(), 48);
        for w in set.iter() {
            assert!(w.lags.is_empty());
            assert_eq!(w.targets.len(), 14);
            assert_eq!(w.origin.unwrap().weekday().num_days_from_monday(), 4);
        }
    }

    #[test]
    fn predict_mode_allows_unknown_targets() {
        let mut s = series(6);
        let mut y = s.target().to_vec();
        y[4] = f64::NAN;
        y[5] = f64::NAN;
        s.set_column("y", y).unwrap();
        let cfg = config(2, 2);

        assert_eq!(WindowSet::new(&s, &cfg, WindowMode::Train).unwrap().len(), 1);
        let predict = WindowSet::new(&s, &cfg, WindowMode::Predict).unwrap();
        assert_eq!(predict.target_starts(), &[2, 3, 4]);
    }

    #[test]
    fn predict_mode_requires_future_regressors() {
        let mut s = series(5);
        s.set_column("temp", vec![1.0, 2.0, 3.0, 4.0, f64::NAN]).unwrap();
        let cfg = WindowConfig {
            future_regressors: vec!["temp".to_string()],
            ..config(2, 1)
        };
        assert!(matches!(
            WindowSet::new(&s, &cfg, WindowMode::Predict),
            Err(ForecastError::AuxiliaryMismatch(_))
        ));
        assert_eq!(WindowSet::new(&s, &cfg, WindowMode::Train).unwrap().len(), 2);
    }

    #[test]
    fn event_offsets_and_seasonal_features_are_built() {
        let mut s = series(10);
        let mut flag = vec![0.0; 10];
        flag[4] = 1.0;
        s.set_column("promo", flag).unwrap();
        let cfg = WindowConfig {
            events: vec![EventSpec::new("promo").with_window(-1, 1).unwrap()],
            seasonalities: vec![SeasonalityComponent::new("daily", 1.0, 2).unwrap()],
            ..config(2, 3)
        };
        let set = WindowSet::new(&s, &cfg, WindowMode::Train).unwrap();
        let w = set.get(1).unwrap(); // targets at rows 3, 4, 5

        assert_eq!(cfg.event_features(), vec!["promo_-1", "promo", "promo_+1"]);
        assert_eq!(w.events[0], vec![1.0, 0.0, 0.0]);
        assert_eq!(w.events[1], vec![0.0, 1.0, 0.0]);
        assert_eq!(w.events[2], vec![0.0, 0.0, 1.0]);
        assert_eq!(w.seasonal[0].len(), 3);
        assert_eq!(w.seasonal[0][0].len(), 4);
    }

    #[test]
    fn rejects_invalid_rules() {
        let rule = PredictionFrequency {
            weekly_day: Some(7),
            ..Default::default()
        };
        assert!(rule.validate().is_err());
        assert!(PredictionFrequency::default().is_empty());
    }
}

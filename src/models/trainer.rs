//! Seeded mini-batch training.

use crate::data::{ShiftScale, Window};
use crate::error::{ForecastError, Result};
use crate::models::config::LossKind;
use crate::models::traits::{Batch, TimeNet};
use crate::utils::{Metric, MetricsTable};
use rand::prelude::*;
use rand::rngs::StdRng;
use tracing::{debug, info};

/// Learning rate used when none is configured.
pub const DEFAULT_LEARNING_RATE: f64 = 0.05;

const MIN_BATCH: usize = 8;
const MAX_BATCH: usize = 256;
const MIN_EPOCHS: usize = 50;
const MAX_EPOCHS: usize = 500;
const EVAL_CHUNK: usize = 1024;

/// Resolved training parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

impl TrainConfig {
    /// Fill unset parameters from the number of training samples.
    ///
    /// Batches grow with the order of magnitude of the data; epochs shrink so
    /// larger data sets see a similar number of updates.
    pub fn auto(
        n_samples: usize,
        epochs: Option<usize>,
        batch_size: Option<usize>,
        learning_rate: Option<f64>,
        seed: u64,
    ) -> Self {
        let n = n_samples.max(1) as f64;
        let batch_size = batch_size.unwrap_or_else(|| {
            let log = n.log10().floor() as i32;
            (2f64.powi(2 + log) as usize).clamp(MIN_BATCH, MAX_BATCH).min(n_samples.max(1))
        });
        let epochs = epochs.unwrap_or_else(|| {
            let e = 2f64.powf(2.5 * (100.0 + n).log10()) / (n / 1000.0);
            (e as usize).clamp(MIN_EPOCHS, MAX_EPOCHS)
        });
        Self {
            epochs,
            batch_size,
            learning_rate: learning_rate.unwrap_or(DEFAULT_LEARNING_RATE),
            seed,
        }
    }
}

/// Windows with their series index and target scale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSet {
    pub windows: Vec<Window>,
    pub groups: Vec<Option<usize>>,
    pub target_scales: Vec<ShiftScale>,
}

impl SampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the windows of one series.
    pub fn extend(&mut self, windows: impl IntoIterator<Item = Window>, group: Option<usize>, scale: ShiftScale) {
        for w in windows {
            self.windows.push(w);
            self.groups.push(group);
            self.target_scales.push(scale);
        }
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn batch(&self) -> Batch<'_> {
        Batch::new(&self.windows, &self.groups)
    }
}

/// Runs epochs over a [`SampleSet`] and records metrics.
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainConfig,
    loss: LossKind,
    metrics: Vec<(String, Metric)>,
    collect: bool,
}

impl Trainer {
    pub fn new(config: TrainConfig, loss: LossKind) -> Self {
        Self {
            config,
            loss,
            metrics: Vec::new(),
            collect: false,
        }
    }

    /// Record the loss and `metrics` after every epoch.
    pub fn with_metrics(mut self, metrics: Vec<(String, Metric)>) -> Self {
        self.metrics = metrics;
        self.collect = true;
        self
    }

    pub fn config(&self) -> TrainConfig {
        self.config
    }

    /// Train `net`; returns the metrics table if metrics are collected.
    pub fn fit(
        &self,
        net: &mut dyn TimeNet,
        train: &SampleSet,
        val: Option<&SampleSet>,
    ) -> Result<Option<MetricsTable>> {
        if train.is_empty() {
            return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
        }
        let mut table = self
            .collect
            .then(|| MetricsTable::new(&self.metrics, val.is_some()));
        let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(1));
        let mut order: Vec<usize> = (0..train.len()).collect();

        info!(
            net = net.name(),
            samples = train.len(),
            epochs = self.config.epochs,
            batch_size = self.config.batch_size,
            learning_rate = self.config.learning_rate,
            "training"
        );

        let mut epoch_loss = f64::NAN;
        for epoch in 0..self.config.epochs {
            order.shuffle(&mut rng);
            let (mut sum, mut batches) = (0.0, 0usize);
            for chunk in order.chunks(self.config.batch_size) {
                let windows: Vec<Window> = chunk.iter().map(|&i| train.windows[i].clone()).collect();
                let groups: Vec<Option<usize>> = chunk.iter().map(|&i| train.groups[i]).collect();
                sum += net.train_batch(&Batch::new(&windows, &groups), self.config.learning_rate)?;
                batches += 1;
            }
            epoch_loss = sum / batches as f64;
            debug!(epoch, loss = epoch_loss, "epoch finished");

            if let Some(table) = table.as_mut() {
                let mut row = vec![epoch_loss];
                row.extend(self.evaluate(&*net, train).into_iter().skip(1));
                if let Some(val) = val {
                    row.extend(self.evaluate(&*net, val));
                }
                table.push(row)?;
            }
        }
        info!(loss = epoch_loss, "training finished");
        Ok(table)
    }

    /// Loss in normalized units followed by each metric in original units.
    pub fn evaluate(&self, net: &dyn TimeNet, set: &SampleSet) -> Vec<f64> {
        let mut loss_sum = 0.0;
        let mut count = 0usize;
        let mut actual = Vec::new();
        let mut predicted = Vec::new();

        let idx: Vec<usize> = (0..set.len()).collect();
        for chunk in idx.chunks(EVAL_CHUNK) {
            let start = chunk[0];
            let end = start + chunk.len();
            let out = net.forward(&Batch::new(&set.windows[start..end], &set.groups[start..end]));
            for (k, pred) in out.iter().enumerate() {
                let i = start + k;
                let scale = set.target_scales[i];
                let Some(median) = pred.first() else {
                    continue;
                };
                for (&p, &y) in median.iter().zip(&set.windows[i].targets) {
                    if !y.is_finite() {
                        continue;
                    }
                    loss_sum += self.loss.value(p - y);
                    count += 1;
                    actual.push(scale.invert(y));
                    predicted.push(scale.invert(p));
                }
            }
        }

        let loss = if count == 0 { f64::NAN } else { loss_sum / count as f64 };
        let mut row = vec![loss];
        row.extend(self.metrics.iter().map(|(_, m)| m.compute(&actual, &predicted)));
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureMode;
    use crate::models::config::GrowthMode;
    use crate::models::linear::LinearNet;
    use crate::models::traits::NetShape;
    use crate::utils::MetricsSpec;

    fn samples(n: usize) -> SampleSet {
        let mut set = SampleSet::new();
        let windows = (0..n).map(|i| {
            let t = i as f64 / n as f64;
            Window {
                id: "a".to_string(),
                target_start: i,
                origin: None,
                lags: Vec::new(),
                covariates: Vec::new(),
                targets: vec![2.0 * t],
                time: vec![t],
                seasonal: Vec::new(),
                regressors: Vec::new(),
                events: Vec::new(),
            }
        });
        set.extend(windows, Some(0), ShiftScale { shift: 10.0, scale: 2.0 });
        set
    }

    fn net(seed: u64) -> LinearNet {
        LinearNet::new(&NetShape {
            n_lags: 0,
            n_forecasts: 1,
            covariate_lags: Vec::new(),
            regressor_modes: Vec::new(),
            event_modes: Vec::new(),
            seasonal_widths: Vec::new(),
            seasonality_mode: FeatureMode::Additive,
            growth: GrowthMode::Linear,
            changepoints: Vec::new(),
            n_series: 1,
            trend_local: false,
            season_local: false,
            quantiles: vec![0.5],
            loss: LossKind::Huber,
            seed,
        })
        .unwrap()
    }

    #[test]
    fn auto_parameters_scale_with_data() {
        let small = TrainConfig::auto(100, None, None, None, 0);
        let large = TrainConfig::auto(10_000, None, None, None, 0);
        assert!(small.batch_size < large.batch_size);
        assert!(small.epochs >= large.epochs);
        assert!((MIN_EPOCHS..=MAX_EPOCHS).contains(&large.epochs));
        assert_eq!(small.learning_rate, DEFAULT_LEARNING_RATE);

        let fixed = TrainConfig::auto(100, Some(3), Some(10), Some(1.0), 0);
        assert_eq!((fixed.epochs, fixed.batch_size, fixed.learning_rate), (3, 10, 1.0));
        assert_eq!(TrainConfig::auto(5, None, None, None, 0).batch_size, 5);
    }

    #[test]
    fn records_one_row_per_epoch() {
        let config = TrainConfig::auto(50, Some(30), Some(10), Some(0.05), 1);
        let metrics = MetricsSpec::default().resolve().unwrap();
        let trainer = Trainer::new(config, LossKind::Huber).with_metrics(metrics);
        let mut model = net(1);
        let set = samples(50);
        let table = trainer.fit(&mut model, &set, Some(&set)).unwrap().unwrap();

        assert_eq!(table.len(), 30);
        assert_eq!(table.columns(), &["Loss", "MAE", "RMSE", "Loss_val", "MAE_val", "RMSE_val"]);
        let loss = table.column("Loss").unwrap();
        assert!(loss[29] < loss[0]);
    }

    #[test]
    fn no_table_without_metrics() {
        let config = TrainConfig::auto(20, Some(2), Some(10), Some(0.05), 1);
        let trainer = Trainer::new(config, LossKind::Huber);
        assert!(trainer.fit(&mut net(1), &samples(20), None).unwrap().is_none());
        assert!(trainer.fit(&mut net(1), &SampleSet::new(), None).is_err());
    }

    #[test]
    fn metrics_use_original_units() {
        let trainer = Trainer::new(TrainConfig::auto(4, Some(1), None, None, 0), LossKind::Mse)
            .with_metrics(vec![("MAE".to_string(), Metric::Mae)]);
        let set = samples(4);
        let model = net(3);
        let normalized = trainer.evaluate(&model, &set);

        let out = model.forward(&set.batch());
        let mae_norm: f64 = out
            .iter()
            .zip(&set.windows)
            .map(|(p, w)| (p[0][0] - w.targets[0]).abs())
            .sum::<f64>()
            / 4.0;
        approx::assert_relative_eq!(normalized[1], 2.0 * mae_norm, epsilon = 1e-9);
    }
}

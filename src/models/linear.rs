//! Reference linear additive network.
//!
//! Each output head (one per quantile) is
//! `trend + trend * multiplicative + additive`, where the trend is piecewise
//! linear in normalized time and every other component is linear in its
//! features: Fourier terms, target lags, covariate lags, future regressors and
//! event indicators. Parameters live in one flat vector and are trained with
//! Adam.

use crate::data::Window;
use crate::error::{ForecastError, Result};
use crate::features::FeatureMode;
use crate::models::config::GrowthMode;
use crate::models::traits::{Batch, NetShape, TimeNet};
use rand::prelude::*;
use rand::rngs::StdRng;

const INIT_SCALE: f64 = 0.01;
const MAX_GRAD_NORM: f64 = 10.0;
const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPS: f64 = 1e-8;

/// How a parameter enters the prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Trend,
    Mult,
    Add,
}

impl From<FeatureMode> for Role {
    fn from(mode: FeatureMode) -> Self {
        match mode {
            FeatureMode::Additive => Role::Add,
            FeatureMode::Multiplicative => Role::Mult,
        }
    }
}

/// Offsets of the parameter blocks within one head.
#[derive(Debug, Clone, PartialEq)]
struct Layout {
    trend_groups: usize,
    trend_width: usize,
    season_start: usize,
    season_groups: usize,
    season_width: usize,
    season_offsets: Vec<usize>,
    ar_start: usize,
    cov_start: usize,
    cov_width: usize,
    reg_start: usize,
    event_start: usize,
    head: usize,
}

impl Layout {
    fn new(shape: &NetShape) -> Self {
        let n_series = shape.n_series.max(1);
        let trend_groups = match shape.growth {
            GrowthMode::Off => 0,
            GrowthMode::Linear if shape.trend_local => n_series,
            GrowthMode::Linear => 1,
        };
        let trend_width = 2 + shape.changepoints.len();
        let season_groups = if shape.season_local { n_series } else { 1 };
        let season_offsets: Vec<usize> = shape
            .seasonal_widths
            .iter()
            .scan(0, |acc, w| {
                let start = *acc;
                *acc += w;
                Some(start)
            })
            .collect();
        let season_width: usize = shape.seasonal_widths.iter().sum();
        let cov_width: usize = shape.covariate_lags.iter().sum();

        let season_start = trend_groups * trend_width;
        let ar_start = season_start + season_groups * season_width;
        let cov_start = ar_start + shape.n_forecasts * shape.n_lags;
        let reg_start = cov_start + shape.n_forecasts * cov_width;
        let event_start = reg_start + shape.regressor_modes.len();
        let head = event_start + shape.event_modes.len();
        Self {
            trend_groups,
            trend_width,
            season_start,
            season_groups,
            season_width,
            season_offsets,
            ar_start,
            cov_start,
            cov_width,
            reg_start,
            event_start,
            head,
        }
    }
}

/// Adam optimizer state.
#[derive(Debug, Clone, PartialEq)]
struct Adam {
    m: Vec<f64>,
    v: Vec<f64>,
    t: i32,
}

impl Adam {
    fn new(n: usize) -> Self {
        Self {
            m: vec![0.0; n],
            v: vec![0.0; n],
            t: 0,
        }
    }

    fn step(&mut self, params: &mut [f64], grad: &[f64], lr: f64) {
        self.t += 1;
        let c1 = 1.0 - BETA1.powi(self.t);
        let c2 = 1.0 - BETA2.powi(self.t);
        for i in 0..params.len() {
            self.m[i] = BETA1 * self.m[i] + (1.0 - BETA1) * grad[i];
            self.v[i] = BETA2 * self.v[i] + (1.0 - BETA2) * grad[i] * grad[i];
            let m_hat = self.m[i] / c1;
            let v_hat = self.v[i] / c2;
            params[i] -= lr * m_hat / (v_hat.sqrt() + EPS);
        }
    }
}

/// Pinball loss and its derivative for residual `r = prediction - target`.
fn pinball(q: f64, r: f64) -> (f64, f64) {
    let e = -r;
    if e >= 0.0 {
        (q * e, -q)
    } else {
        ((q - 1.0) * e, 1.0 - q)
    }
}

/// Linear additive network with one head per quantile.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearNet {
    shape: NetShape,
    layout: Layout,
    params: Vec<f64>,
    adam: Adam,
}

impl LinearNet {
    /// Build a network with small random weights drawn from `shape.seed`.
    pub fn new(shape: &NetShape) -> Result<Self> {
        if shape.quantiles.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "network needs at least one output quantile".to_string(),
            ));
        }
        if shape.n_forecasts == 0 {
            return Err(ForecastError::InvalidParameter(
                "n_forecasts must be at least 1".to_string(),
            ));
        }
        let layout = Layout::new(shape);
        let n = layout.head * shape.quantiles.len();
        let mut rng = StdRng::seed_from_u64(shape.seed);
        let params = (0..n).map(|_| rng.gen_range(-INIT_SCALE..INIT_SCALE)).collect();
        Ok(Self {
            shape: shape.clone(),
            layout,
            params,
            adam: Adam::new(n),
        })
    }

    pub fn n_params(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &[f64] {
        &self.params
    }

    fn group_weights(&self, local: bool, groups: usize, group: Option<usize>) -> Vec<(usize, f64)> {
        if !local || groups <= 1 {
            return vec![(0, 1.0)];
        }
        match group {
            Some(g) if g < groups => vec![(g, 1.0)],
            _ => (0..groups).map(|g| (g, 1.0 / groups as f64)).collect(),
        }
    }

    /// Call `f(param_index, feature, role)` for every term of step `h`.
    fn visit<F>(&self, head: usize, w: &Window, group: Option<usize>, h: usize, mut f: F)
    where
        F: FnMut(usize, f64, Role),
    {
        let l = &self.layout;
        let shape = &self.shape;
        let base = head * l.head;

        if l.trend_groups > 0 {
            let t = w.time[h];
            for (g, wt) in self.group_weights(shape.trend_local, l.trend_groups, group) {
                let p = base + g * l.trend_width;
                f(p, wt, Role::Trend);
                f(p + 1, wt * t, Role::Trend);
                for (j, c) in shape.changepoints.iter().enumerate() {
                    f(p + 2 + j, wt * (t - c).max(0.0), Role::Trend);
                }
            }
        }

        let season_role = Role::from(shape.seasonality_mode);
        for (g, wt) in self.group_weights(shape.season_local, l.season_groups, group) {
            let p = base + l.season_start + g * l.season_width;
            for (c, comp) in w.seasonal.iter().enumerate() {
                for (j, x) in comp[h].iter().enumerate() {
                    f(p + l.season_offsets[c] + j, wt * x, season_role);
                }
            }
        }

        let ar = base + l.ar_start + h * shape.n_lags;
        for (j, x) in w.lags.iter().enumerate() {
            f(ar + j, *x, Role::Add);
        }

        let cov = base + l.cov_start + h * l.cov_width;
        for (j, x) in w.covariates.iter().flatten().enumerate() {
            f(cov + j, *x, Role::Add);
        }

        for (r, (values, mode)) in w.regressors.iter().zip(&shape.regressor_modes).enumerate() {
            f(base + l.reg_start + r, values[h], Role::from(*mode));
        }

        for (e, (values, mode)) in w.events.iter().zip(&shape.event_modes).enumerate() {
            f(base + l.event_start + e, values[h], Role::from(*mode));
        }
    }

    /// `(prediction, trend, multiplicative sum)` of step `h`.
    fn step_parts(&self, head: usize, w: &Window, group: Option<usize>, h: usize) -> (f64, f64, f64) {
        let (mut trend, mut mult, mut add) = (0.0, 0.0, 0.0);
        self.visit(head, w, group, h, |i, x, role| {
            let v = self.params[i] * x;
            match role {
                Role::Trend => trend += v,
                Role::Mult => mult += v,
                Role::Add => add += v,
            }
        });
        (trend + trend * mult + add, trend, mult)
    }

    fn head_loss(&self, head: usize, r: f64) -> (f64, f64) {
        let q = self.shape.quantiles[head];
        if head == 0 {
            (self.shape.loss.value(r), self.shape.loss.gradient(r))
        } else {
            pinball(q, r)
        }
    }
}

impl TimeNet for LinearNet {
    fn forward(&self, batch: &Batch<'_>) -> Vec<Vec<Vec<f64>>> {
        batch
            .windows
            .iter()
            .zip(batch.groups)
            .map(|(w, &group)| {
                (0..self.shape.quantiles.len())
                    .map(|q| {
                        (0..self.shape.n_forecasts)
                            .map(|h| self.step_parts(q, w, group, h).0)
                            .collect()
                    })
                    .collect()
            })
            .collect()
    }

    fn train_batch(&mut self, batch: &Batch<'_>, learning_rate: f64) -> Result<f64> {
        let mut grad = vec![0.0; self.params.len()];
        let mut total = 0.0;
        let mut count = 0usize;

        for (w, &group) in batch.windows.iter().zip(batch.groups) {
            for h in 0..self.shape.n_forecasts {
                let target = w.targets[h];
                if !target.is_finite() {
                    continue;
                }
                count += 1;
                for q in 0..self.shape.quantiles.len() {
                    let (pred, trend, mult) = self.step_parts(q, w, group, h);
                    let (loss, dy) = self.head_loss(q, pred - target);
                    total += loss;
                    self.visit(q, w, group, h, |i, x, role| {
                        let scale = match role {
                            Role::Trend => 1.0 + mult,
                            Role::Mult => trend,
                            Role::Add => 1.0,
                        };
                        grad[i] += dy * scale * x;
                    });
                }
            }
        }

        if count == 0 {
            return Ok(0.0);
        }
        let loss = total / count as f64;
        if !loss.is_finite() {
            return Err(ForecastError::ComputationError(
                "training loss is not finite".to_string(),
            ));
        }

        let inv = 1.0 / count as f64;
        let norm = grad.iter().map(|g| (g * inv).powi(2)).sum::<f64>().sqrt();
        let clip = if norm > MAX_GRAD_NORM { MAX_GRAD_NORM / norm } else { 1.0 };
        for g in &mut grad {
            *g *= inv * clip;
        }
        self.adam.step(&mut self.params, &grad, learning_rate);
        Ok(loss)
    }

    fn name(&self) -> &str {
        "LinearNet"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::LossKind;
    use approx::assert_relative_eq;

    fn shape() -> NetShape {
        NetShape {
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
            loss: LossKind::Mse,
            seed: 7,
        }
    }

    fn window(t: f64, target: f64) -> Window {
        Window {
            id: "a".to_string(),
            target_start: 0,
            origin: None,
            lags: Vec::new(),
            covariates: Vec::new(),
            targets: vec![target],
            time: vec![t],
            seasonal: Vec::new(),
            regressors: Vec::new(),
            events: Vec::new(),
        }
    }

    fn train(net: &mut LinearNet, windows: &[Window], steps: usize, lr: f64) {
        let groups = vec![Some(0); windows.len()];
        for _ in 0..steps {
            net.train_batch(&Batch::new(windows, &groups), lr).unwrap();
        }
    }

    #[test]
    fn parameter_count_follows_components() {
        let mut s = shape();
        s.n_lags = 3;
        s.n_forecasts = 2;
        s.covariate_lags = vec![2];
        s.regressor_modes = vec![FeatureMode::Additive];
        s.event_modes = vec![FeatureMode::Multiplicative; 3];
        s.seasonal_widths = vec![6, 4];
        s.changepoints = vec![0.2, 0.4];
        s.quantiles = vec![0.5, 0.9];
        let net = LinearNet::new(&s).unwrap();

        // trend 4 + season 10 + ar 6 + covariates 4 + regressor 1 + events 3, per head
        assert_eq!(net.n_params(), 2 * 28);
    }

    #[test]
    fn learns_a_linear_trend() {
        let windows: Vec<Window> = (0..20)
            .map(|i| {
                let t = i as f64 / 19.0;
                window(t, 0.5 + t)
            })
            .collect();
        let mut net = LinearNet::new(&shape()).unwrap();
        train(&mut net, &windows, 3000, 0.01);

        let groups = vec![Some(0); windows.len()];
        let out = net.forward(&Batch::new(&windows, &groups));
        for (w, pred) in windows.iter().zip(&out) {
            assert!((pred[0][0] - w.targets[0]).abs() < 0.05);
        }
    }

    #[test]
    fn quantile_heads_spread() {
        let windows: Vec<Window> = (0..40)
            .map(|i| window(i as f64 / 39.0, if i % 2 == 0 { 0.0 } else { 1.0 }))
            .collect();
        let mut s = shape();
        s.quantiles = vec![0.5, 0.1, 0.9];
        let mut net = LinearNet::new(&s).unwrap();
        train(&mut net, &windows, 2000, 0.01);

        let probe = [window(0.5, f64::NAN)];
        let out = net.forward(&Batch::new(&probe, &[Some(0)]));
        assert!(out[0][2][0] > out[0][1][0] + 0.5);
    }

    #[test]
    fn unknown_series_average_local_trend() {
        let mut s = shape();
        s.trend_local = true;
        s.n_series = 2;
        let mut net = LinearNet::new(&s).unwrap();
        net.params.iter_mut().for_each(|p| *p = 0.0);
        net.params[0] = 1.0;
        net.params[2] = 3.0;

        let probe = [window(0.0, f64::NAN)];
        let known = net.forward(&Batch::new(&probe, &[Some(1)]));
        let unknown = net.forward(&Batch::new(&probe, &[None]));
        assert_relative_eq!(known[0][0][0], 3.0);
        assert_relative_eq!(unknown[0][0][0], 2.0);
    }

    #[test]
    fn seeds_are_reproducible() {
        let a = LinearNet::new(&shape()).unwrap();
        let b = LinearNet::new(&shape()).unwrap();
        let mut other = shape();
        other.seed = 8;
        let c = LinearNet::new(&other).unwrap();

        assert_eq!(a.params(), b.params());
        assert_ne!(a.params(), c.params());
    }

    #[test]
    fn pinball_is_asymmetric() {
        assert_relative_eq!(pinball(0.9, -1.0).0, 0.9);
        assert_relative_eq!(pinball(0.9, 1.0).0, 0.1);
        assert_relative_eq!(pinball(0.9, 1.0).1, 0.1);
        assert_relative_eq!(pinball(0.9, -1.0).1, -0.9);
    }
}

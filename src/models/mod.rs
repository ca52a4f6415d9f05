//! Forecasting model: configuration, network, training and the user-facing forecaster.

mod traits;

pub mod config;
pub mod forecaster;
pub mod linear;
pub mod trainer;

pub use config::{
    Components, FutureRegressorSpec, GlobalLocal, GrowthMode, LagSpec, LaggedRegressorSpec,
    LossKind, ModelConfig,
};
pub use forecaster::NeuralForecaster;
pub use linear::LinearNet;
pub use trainer::{SampleSet, TrainConfig, Trainer, DEFAULT_LEARNING_RATE};
pub use traits::{Batch, BoxedNet, NetShape, NetSpec, TimeNet};

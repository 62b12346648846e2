//! Forest training.
//!
//! - [`TrainConfig`]: Builder-validated configuration
//! - [`Sampler`], [`BootstrapSampler`], [`SubSampler`]: Per-tree bagging
//! - [`SplitFrontier`]: The split-selection service trees are grown with
//! - [`Frontier`]: Level-wise growth of one pre-tree
//! - [`ForestTrainer`]: Block-wise production and consumption of trees
//! - [`TrainingLogger`], [`Verbosity`]: Structured progress events

pub mod config;
pub mod frontier;
pub mod logger;
pub mod sampling;
pub mod split;
pub mod trainer;

pub use config::{ConfigError, TrainConfig};
pub use frontier::Frontier;
pub use logger::{TrainingLogger, Verbosity};
pub use sampling::{sampler_for, BagSample, BootstrapSampler, SampledObs, Sampler, SubSampler};
pub use split::{FrontierNode, NuxCrit, SplitFrontier, SplitNux, SplitRule};
pub use trainer::{ForestTrainer, LeafMap, TrainError, TrainedForest};

//! Forest training configuration with builder pattern.
//!
//! ```
//! use arborist::training::TrainConfig;
//!
//! let config = TrainConfig::builder()
//!     .n_tree(100)
//!     .leaf_max(32)
//!     .n_threads(1)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.tree_block, 20);
//! ```

use bon::Builder;
use serde::{Deserialize, Serialize};

use super::logger::Verbosity;

// =============================================================================
// ConfigError
// =============================================================================

/// Errors raised while validating a [`TrainConfig`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// At least one tree is required.
    InvalidNTree,
    /// Trees per block must be at least 1.
    InvalidTreeBlock,
    /// Nodes need at least one sample to be split.
    InvalidMinNode,
    /// Ratio outside its valid range.
    InvalidRatio { field: &'static str, value: f64 },
    /// Sample count must be positive when given.
    InvalidSampleCount,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNTree => write!(f, "n_tree must be at least 1"),
            Self::InvalidTreeBlock => write!(f, "tree_block must be at least 1"),
            Self::InvalidMinNode => write!(f, "min_node must be at least 1"),
            Self::InvalidRatio { field, value } => {
                write!(f, "{} must be in [0, 1], got {}", field, value)
            }
            Self::InvalidSampleCount => write!(f, "n_samp must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}

// =============================================================================
// TrainConfig
// =============================================================================

/// Configuration shared by the trainer, the frontier and every pre-tree.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct TrainConfig {
    // === Forest ===
    /// Trees to grow. Default: 500.
    #[builder(default = 500)]
    pub n_tree: usize,

    /// Trees produced per block before consumption. Default: 20.
    #[builder(default = 20)]
    pub tree_block: usize,

    // === Sampling ===
    /// Samples drawn per tree. `None` draws one per row.
    pub n_samp: Option<usize>,

    /// Draw with replacement. Default: true.
    #[builder(default = true)]
    pub with_replacement: bool,

    // === Tree shape ===
    /// Leaf budget per tree, enforced by leaf merging. 0 disables it.
    #[builder(default)]
    pub leaf_max: usize,

    /// Smallest sample count a node must hold to be split. Default: 2.
    #[builder(default = 2)]
    pub min_node: usize,

    /// Depth limit. 0 means unlimited.
    #[builder(default)]
    pub tot_levels: usize,

    /// Smallest ratio of child to parent info for a split to be kept.
    #[builder(default)]
    pub min_ratio: f64,

    // === Frame ===
    /// Fraction of rows a single rank must exceed for its predictor to be
    /// stored densely. Default: 0.25.
    #[builder(default = 0.25)]
    pub auto_compress: f64,

    // === Resources ===
    /// Worker threads. 0 uses the global pool, 1 runs sequentially.
    #[builder(default)]
    pub n_threads: usize,

    /// Random seed. Default: 42.
    #[builder(default = 42)]
    pub seed: u64,

    /// Verbosity level. Default: `Silent`.
    #[builder(default)]
    pub verbosity: Verbosity,
}

impl<S: train_config_builder::IsComplete> TrainConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any parameter is invalid:
    /// - `n_tree`, `tree_block` or `min_node` is zero
    /// - `n_samp` is `Some(0)`
    /// - `min_ratio` or `auto_compress` lies outside `[0, 1]`
    pub fn build(self) -> Result<TrainConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl TrainConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.n_tree == 0 {
            return Err(ConfigError::InvalidNTree);
        }
        if self.tree_block == 0 {
            return Err(ConfigError::InvalidTreeBlock);
        }
        if self.min_node == 0 {
            return Err(ConfigError::InvalidMinNode);
        }
        if self.n_samp == Some(0) {
            return Err(ConfigError::InvalidSampleCount);
        }
        for (field, value) in [("min_ratio", self.min_ratio), ("auto_compress", self.auto_compress)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidRatio { field, value });
            }
        }
        Ok(())
    }

    /// Samples drawn per tree for a frame of `n_row` rows.
    #[inline]
    pub fn samples_per_tree(&self, n_row: usize) -> usize {
        self.n_samp.unwrap_or(n_row)
    }
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self::builder().__build_internal()
    }
}

// =============================================================================
// Tests
// =============================================================================

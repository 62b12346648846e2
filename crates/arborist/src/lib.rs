//! arborist: run-length encoded observation frames and crescent forest
//! construction for random forests.
//!
//! # Key Types
//!
//! - [`ObservationFrameBuilder`] / [`TrainFrame`] - Rank-encoded training data
//! - [`PreTree`] - One tree under construction
//! - [`ForestCresc`] / [`RawForest`] - Forest-wide node and factor-bit buffers
//! - [`TrainConfig`] / [`ForestTrainer`] - Configuration and block-wise training
//!
//! # Training
//!
//! Build a frame, pick a [`SplitFrontier`], then call
//! [`ForestTrainer::train`]. Split scoring is supplied by the caller; the
//! [`testing`] module has deterministic splitters.
//!
//! ```
//! use arborist::testing::MedianSplitter;
//! use arborist::{ForestTrainer, ObservationFrameBuilder, Parallelism, TrainConfig};
//!
//! let frame = ObservationFrameBuilder::new(6)
//!     .numeric_column(&[3.1, 1.0, 1.0, 7.2, f64::NAN, 0.5])
//!     .factor_column(&[0, 1, 2, 1, 0, 2], 3)
//!     .build(Parallelism::Sequential)
//!     .unwrap();
//!
//! let config = TrainConfig::builder().n_tree(4).leaf_max(3).n_threads(1).build().unwrap();
//! let trainer = ForestTrainer::new(config, MedianSplitter);
//! let frame = trainer.prepare(frame).unwrap();
//! let trained = trainer.train(&frame).unwrap();
//! assert_eq!(trained.forest.height().len(), 4);
//! ```

pub mod data;
pub mod forest;
pub mod io;
pub mod testing;
pub mod training;
pub mod tree;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use data::{FrameError, ObservationFrame, ObservationFrameBuilder, TrainFrame};
pub use forest::{ForestCresc, RawForest};
pub use tree::PreTree;
pub use training::{ForestTrainer, SplitFrontier, TrainConfig, TrainError, TrainedForest};
pub use utils::{run_with_threads, Parallelism};

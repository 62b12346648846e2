//! Forest trainer.
//!
//! Trees are produced in blocks: every tree of a block is sampled, grown and
//! leaf-merged independently (in parallel when allowed), then the block is
//! consumed into the forest sequentially in tree order. Each tree draws from
//! its own random stream, so the forest does not depend on the thread count.

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use thiserror::Error;

use super::config::{ConfigError, TrainConfig};
use super::frontier::Frontier;
use super::logger::TrainingLogger;
use super::sampling::{sampler_for, BagSample, Sampler};
use super::split::SplitFrontier;
use crate::data::{FrameError, ObservationFrame, TrainFrame};
use crate::forest::{ForestCresc, ForestError};
use crate::io::ForestArchive;
use crate::tree::{PreTree, PreTreeError};
use crate::utils::{run_with_threads, Parallelism};

// =============================================================================
// TrainError
// =============================================================================

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("tree {tree}: {source}")]
    Tree {
        tree: usize,
        #[source]
        source: PreTreeError,
    },

    #[error(transparent)]
    Forest(#[from] ForestError),

    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

// =============================================================================
// Output
// =============================================================================

/// Bag and leaf assignment of one tree.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafMap {
    pub bag: BagSample,
    /// Leaf index of each bagged sample, parallel to `bag.samples()`.
    pub leaves: Vec<u32>,
}

impl LeafMap {
    /// Leaf holding `row`, if the row is in bag.
    pub fn leaf_of_row(&self, row: usize) -> Option<u32> {
        self.bag
            .samples()
            .binary_search_by_key(&(row as u32), |s| s.row)
            .ok()
            .map(|k| self.leaves[k])
    }
}

#[derive(Debug, Clone)]
pub struct TrainedForest {
    pub forest: ForestCresc,
    /// Split info summed per predictor.
    pub pred_info: Vec<f64>,
    pub leaves: Vec<LeafMap>,
}

impl TrainedForest {
    pub fn archive(&self, frame: &TrainFrame) -> ForestArchive {
        ForestArchive::new(frame, self.forest.dump(), self.pred_info.clone())
    }
}

/// A tree ready for consumption.
struct Produced {
    tree: PreTree,
    bag: BagSample,
    merges: usize,
}

// =============================================================================
// ForestTrainer
// =============================================================================

pub struct ForestTrainer<F: SplitFrontier> {
    config: TrainConfig,
    splitter: F,
    sampler: Box<dyn Sampler>,
}

impl<F: SplitFrontier> ForestTrainer<F> {
    /// Trainer drawing bags as described by `config`.
    pub fn new(config: TrainConfig, splitter: F) -> Self {
        let sampler = sampler_for(&config);
        Self { config, splitter, sampler }
    }

    /// Replaces the configured sampler.
    pub fn with_sampler(mut self, sampler: impl Sampler + 'static) -> Self {
        self.sampler = Box::new(sampler);
        self
    }

    #[inline]
    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Lays out `frame` for training with the configured compression
    /// threshold and thread count.
    pub fn prepare(&self, frame: ObservationFrame) -> Result<TrainFrame, TrainError> {
        let auto_compress = self.config.auto_compress;
        let frame = run_with_threads(self.config.n_threads, |parallelism| {
            TrainFrame::new(frame, auto_compress, parallelism)
        })??;
        Ok(frame)
    }

    /// Trains the forest.
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration, a thread pool that cannot be built,
    /// or any tree whose growth fails. No partial forest is returned.
    pub fn train(&self, frame: &TrainFrame) -> Result<TrainedForest, TrainError> {
        self.config.validate()?;
        run_with_threads(self.config.n_threads, |parallelism| self.train_blocks(frame, parallelism))?
    }

    fn train_blocks(
        &self,
        frame: &TrainFrame,
        parallelism: Parallelism,
    ) -> Result<TrainedForest, TrainError> {
        let config = &self.config;
        let mut logger = TrainingLogger::new(config.verbosity);
        logger.start_training(config.n_tree, frame.n_row(), frame.n_pred());

        let mut height_est =
            initial_height_estimate(config.samples_per_tree(frame.n_row()), config.min_node);
        let mut forest = ForestCresc::new(config.n_tree);
        let mut pred_info = vec![0.0; frame.n_pred()];
        let mut leaves = Vec::with_capacity(config.n_tree);

        for block_start in (0..config.n_tree).step_by(config.tree_block) {
            let block_end = (block_start + config.tree_block).min(config.n_tree);
            let produced = parallelism.maybe_par_map(block_start..block_end, |t_idx| {
                self.produce(frame, t_idx, height_est)
                    .map_err(|source| TrainError::Tree { tree: t_idx, source })
            });
            let produced = produced.into_iter().collect::<Result<Vec<_>, _>>()?;

            if block_start == 0 {
                let tallest = produced.iter().map(|p| p.tree.height()).max().unwrap_or(1);
                height_est = (tallest + 1).next_power_of_two();
                logger.log_height_estimate(height_est);
            }
            forest.reserve(produced.iter().map(|p| p.tree.height()).sum());

            for (t_idx, p) in (block_start..).zip(produced) {
                logger.log_leaf_merge(t_idx, p.merges, p.tree.leaf_count());
                if p.tree.height() == 1 {
                    logger.warn_degenerate(t_idx);
                }
                let sample_leaves = p.tree.consume(&mut forest, t_idx, &mut pred_info)?;
                leaves.push(LeafMap { bag: p.bag, leaves: sample_leaves });
            }
            let n_node = forest.height().last().copied().unwrap_or(0);
            logger.log_block(block_start, block_end - block_start, n_node);
        }

        forest.split_update(frame);
        logger.finish_training();
        Ok(TrainedForest { forest, pred_info, leaves })
    }

    /// Samples, grows and leaf-merges tree `t_idx`.
    fn produce(
        &self,
        frame: &TrainFrame,
        t_idx: usize,
        height_est: usize,
    ) -> Result<Produced, PreTreeError> {
        let mut rng = tree_rng(self.config.seed, t_idx);
        let bag = self.sampler.sample(frame.n_row(), &mut rng);
        let mut tree = PreTree::new(self.config.leaf_max, height_est);
        let sample_map = Frontier::new(frame, &self.config).grow(&mut tree, &bag, &self.splitter)?;
        tree.set_terminals(sample_map)?;
        let merges = tree.leaf_merge(&mut rng);
        Ok(Produced { tree, bag, merges })
    }
}

/// Random stream of tree `t_idx`.
fn tree_rng(seed: u64, t_idx: usize) -> Xoshiro256PlusPlus {
    Xoshiro256PlusPlus::seed_from_u64(seed.wrapping_add(t_idx as u64))
}

/// Node reservation before any tree has been seen: the smallest `L` with
/// `2^L * min_node >= n_samp`, times four.
pub(crate) fn initial_height_estimate(n_samp: usize, min_node: usize) -> usize {
    let min_node = min_node.max(1);
    let mut levels = 0;
    while (min_node << levels) < n_samp {
        levels += 1;
    }
    1 << (levels + 2)
}

//! Training progress reporting through `tracing`.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// How much the trainer reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Verbosity {
    #[default]
    Silent,
    Warning,
    Info,
    Debug,
}

/// Emits training events at or below the configured verbosity.
///
/// Events go to whatever `tracing` subscriber the caller installed.
#[derive(Debug)]
pub struct TrainingLogger {
    verbosity: Verbosity,
    start: Option<Instant>,
    n_tree: usize,
}

impl TrainingLogger {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity, start: None, n_tree: 0 }
    }

    #[inline]
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    #[inline]
    fn enabled(&self, level: Verbosity) -> bool {
        self.verbosity >= level
    }

    pub fn start_training(&mut self, n_tree: usize, n_row: usize, n_pred: usize) {
        self.start = Some(Instant::now());
        self.n_tree = n_tree;
        if self.enabled(Verbosity::Info) {
            tracing::info!(n_tree, n_row, n_pred, "training started");
        }
    }

    pub fn log_block(&self, block_start: usize, block_len: usize, n_node: usize) {
        if self.enabled(Verbosity::Info) {
            tracing::info!(
                trees = block_start + block_len,
                of = self.n_tree,
                n_node,
                "block consumed"
            );
        }
    }

    pub fn log_height_estimate(&self, height_est: usize) {
        if self.enabled(Verbosity::Debug) {
            tracing::debug!(height_est, "height estimate refined");
        }
    }

    pub fn log_leaf_merge(&self, tree: usize, merges: usize, leaf_count: usize) {
        if merges > 0 && self.enabled(Verbosity::Debug) {
            tracing::debug!(tree, merges, leaf_count, "leaves merged");
        }
    }

    pub fn warn_degenerate(&self, tree: usize) {
        if self.enabled(Verbosity::Warning) {
            tracing::warn!(tree, "tree did not split");
        }
    }

    pub fn finish_training(&self) {
        if self.enabled(Verbosity::Info) {
            let elapsed = self.start.map(|s| s.elapsed()).unwrap_or_default();
            tracing::info!(n_tree = self.n_tree, elapsed_ms = elapsed.as_millis() as u64, "training finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_ordering() {
        assert!(Verbosity::Debug > Verbosity::Info);
        assert!(Verbosity::Warning > Verbosity::Silent);
        assert_eq!(Verbosity::default(), Verbosity::Silent);
    }

    #[test]
    fn test_silent_logger_gates_everything() {
        let logger = TrainingLogger::new(Verbosity::Silent);
        assert!(!logger.enabled(Verbosity::Warning));
        let logger = TrainingLogger::new(Verbosity::Info);
        assert!(logger.enabled(Verbosity::Warning));
        assert!(!logger.enabled(Verbosity::Debug));
    }
}

//! Dense/explicit layout of an observation frame.
//!
//! A predictor whose most frequent rank covers more than
//! `auto_compress * n_row` rows is *compact*: that rank becomes implicit and
//! only the remaining rows are stored. Row lookups return the same rank
//! sequence either way.
//!
//! - [`ImplExpl`]: per-predictor implicit rank, explicit count and staging
//!   offsets
//! - [`Layout`]: the layout for every predictor plus row lookups
//! - [`RankCursor`]: sequential row scanner over one predictor

use std::ops::Range;

use super::error::FrameError;
use super::frame::ObservationFrame;
use super::rle::{Rank, RleRun};
use crate::utils::Parallelism;

/// Implicit/explicit split for one predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImplExpl {
    /// Rank elided from explicit storage, if the predictor is compact.
    pub rank_impl: Option<Rank>,
    /// Rows stored explicitly.
    pub count_expl: usize,
    /// Staging offset: compact predictors accumulate explicit counts,
    /// non-compact predictors take consecutive slots.
    pub safe_offset: usize,
    /// Position among compact predictors.
    pub dense_idx: Option<usize>,
}

// =============================================================================
// Layout
// =============================================================================

#[derive(Debug, Clone)]
pub struct Layout {
    n_row: usize,
    no_rank: Rank,
    impl_expl: Vec<ImplExpl>,
    /// Explicit runs per predictor, ordered by row.
    row_runs: Vec<Vec<RleRun>>,
    n_pred_dense: usize,
    non_compact: usize,
    length_compact: usize,
}

impl Layout {
    /// Lays out every predictor of `frame`.
    ///
    /// # Errors
    ///
    /// [`FrameError::InvalidAutoCompress`] unless `0 <= auto_compress <= 1`.
    pub fn new(
        frame: &ObservationFrame,
        auto_compress: f64,
        parallelism: Parallelism,
    ) -> Result<Self, FrameError> {
        if !(0.0..=1.0).contains(&auto_compress) {
            return Err(FrameError::InvalidAutoCompress(auto_compress));
        }
        let n_row = frame.n_row();
        let max_card = frame.cardinalities().iter().copied().max().unwrap_or(0) as usize;
        let no_rank = n_row.max(max_card) as Rank;
        let dense_thresh = auto_compress * n_row as f64;

        let per_pred = parallelism.maybe_par_map(0..frame.n_pred(), |pred| {
            set_dense(frame.runs(pred), n_row, dense_thresh)
        });

        let mut impl_expl = Vec::with_capacity(per_pred.len());
        let mut row_runs = Vec::with_capacity(per_pred.len());
        let mut non_compact = 0;
        let mut length_compact = 0;
        let mut n_pred_dense = 0;
        for (pred, (rank_impl, runs)) in per_pred.into_iter().enumerate() {
            let count_expl: usize = runs.iter().map(|r| r.extent).sum();
            let entry = match rank_impl {
                Some(_) => {
                    let entry = ImplExpl {
                        rank_impl,
                        count_expl,
                        safe_offset: length_compact,
                        dense_idx: Some(n_pred_dense),
                    };
                    length_compact += count_expl;
                    n_pred_dense += 1;
                    tracing::debug!(pred, rank = ?rank_impl, count_expl, "predictor stored dense");
                    entry
                }
                None => {
                    let entry = ImplExpl {
                        rank_impl,
                        count_expl,
                        safe_offset: non_compact,
                        dense_idx: None,
                    };
                    non_compact += 1;
                    entry
                }
            };
            impl_expl.push(entry);
            row_runs.push(runs);
        }

        Ok(Self {
            n_row,
            no_rank,
            impl_expl,
            row_runs,
            n_pred_dense,
            non_compact,
            length_compact,
        })
    }

    #[inline]
    pub fn n_row(&self) -> usize {
        self.n_row
    }

    /// A rank no predictor attains.
    #[inline]
    pub fn no_rank(&self) -> Rank {
        self.no_rank
    }

    #[inline]
    pub fn impl_expl(&self, pred: usize) -> &ImplExpl {
        &self.impl_expl[pred]
    }

    #[inline]
    pub fn implicit_rank(&self, pred: usize) -> Option<Rank> {
        self.impl_expl[pred].rank_impl
    }

    #[inline]
    pub fn is_dense(&self, pred: usize) -> bool {
        self.impl_expl[pred].rank_impl.is_some()
    }

    #[inline]
    pub fn explicit_count(&self, pred: usize) -> usize {
        self.impl_expl[pred].count_expl
    }

    /// Rows carrying the implicit rank.
    #[inline]
    pub fn implicit_count(&self, pred: usize) -> usize {
        self.n_row - self.impl_expl[pred].count_expl
    }

    #[inline]
    pub fn n_pred_dense(&self) -> usize {
        self.n_pred_dense
    }

    #[inline]
    pub fn dense_idx(&self, pred: usize) -> Option<usize> {
        self.impl_expl[pred].dense_idx
    }

    /// Explicitly stored runs of `pred`, in row order.
    #[inline]
    pub fn explicit_runs(&self, pred: usize) -> &[RleRun] {
        &self.row_runs[pred]
    }

    /// Staging range for `pred` when `bag_count` samples are bagged.
    pub fn safe_range(&self, pred: usize, bag_count: usize) -> Range<usize> {
        let entry = &self.impl_expl[pred];
        if entry.rank_impl.is_some() {
            let start = self.non_compact * bag_count + entry.safe_offset;
            start..start + entry.count_expl
        } else {
            let start = entry.safe_offset * bag_count;
            start..start + bag_count
        }
    }

    /// Total staging size for `bag_count` bagged samples.
    #[inline]
    pub fn safe_size(&self, bag_count: usize) -> usize {
        self.non_compact * bag_count + self.length_compact
    }

    /// Rank of `row` under `pred`.
    pub fn rank_at(&self, pred: usize, row: usize) -> Rank {
        let runs = &self.row_runs[pred];
        let idx = runs.partition_point(|r| r.end() <= row);
        match runs.get(idx) {
            Some(run) if run.row <= row => run.rank,
            _ => self.fallback_rank(pred),
        }
    }

    /// Sequential scanner over the rows of `pred`.
    pub fn cursor(&self, pred: usize) -> RankCursor<'_> {
        RankCursor {
            runs: &self.row_runs[pred],
            fallback: self.fallback_rank(pred),
            idx: 0,
            last_row: 0,
        }
    }

    #[inline]
    fn fallback_rank(&self, pred: usize) -> Rank {
        self.impl_expl[pred].rank_impl.unwrap_or(self.no_rank)
    }
}

/// Chooses the implicit rank, if any, and returns the explicit runs by row.
fn set_dense(runs: &[RleRun], n_row: usize, dense_thresh: f64) -> (Option<Rank>, Vec<RleRun>) {
    let mut dense_max = 0usize;
    let mut arg_max: Option<Rank> = None;
    let mut rank_prev: Option<Rank> = None;
    let mut run_count = 0usize;
    for run in runs {
        if rank_prev == Some(run.rank) {
            run_count += run.extent;
        } else {
            run_count = run.extent;
            rank_prev = Some(run.rank);
        }
        if run_count > dense_max {
            dense_max = run_count;
            arg_max = Some(run.rank);
        }
    }

    let rank_impl = if n_row > 0 && dense_max as f64 > dense_thresh {
        arg_max
    } else {
        None
    };
    let mut explicit: Vec<RleRun> = runs
        .iter()
        .filter(|r| Some(r.rank) != rank_impl)
        .copied()
        .collect();
    explicit.sort_unstable_by_key(|r| r.row);
    (rank_impl, explicit)
}

// =============================================================================
// RankCursor
// =============================================================================

/// Row-to-rank scanner for one predictor.
///
/// Nondecreasing row queries advance in amortized constant time. A query
/// behind the previous one re-seeks by binary search, so any order is
/// answered correctly.
#[derive(Debug, Clone)]
pub struct RankCursor<'a> {
    runs: &'a [RleRun],
    fallback: Rank,
    idx: usize,
    last_row: usize,
}

impl RankCursor<'_> {
    pub fn rank(&mut self, row: usize) -> Rank {
        if row < self.last_row {
            self.idx = self.runs.partition_point(|r| r.end() <= row);
        } else {
            while self.idx < self.runs.len() && self.runs[self.idx].end() <= row {
                self.idx += 1;
            }
        }
        self.last_row = row;
        match self.runs.get(self.idx) {
            Some(run) if run.row <= row => run.rank,
            _ => self.fallback,
        }
    }
}

//! Per-tree row sampling (bagging).
//!
//! - [`BootstrapSampler`]: draws with replacement; rows may repeat.
//! - [`SubSampler`]: draws without replacement.
//!
//! Both take the tree's own random stream so results do not depend on the
//! thread that grows the tree.

use rand::Rng;
use rand_xoshiro::Xoshiro256PlusPlus;

use super::config::TrainConfig;
use crate::data::MAX_ROWS;

// ============================================================================
// BagSample
// ============================================================================

/// One bagged row and its multiplicity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampledObs {
    pub row: u32,
    pub count: u32,
}

/// Rows drawn for one tree, in ascending row order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BagSample {
    n_row: usize,
    samples: Vec<SampledObs>,
}

impl BagSample {
    /// Collapses per-row draw counts into a sample. Rows never drawn are
    /// out of bag. `counts` covers at most [`MAX_ROWS`] rows, which the frame
    /// builder enforces.
    pub fn from_counts(counts: &[u32]) -> Self {
        debug_assert!(counts.len() <= MAX_ROWS);
        let samples = counts
            .iter()
            .enumerate()
            .filter(|(_, &count)| count > 0)
            .map(|(row, &count)| SampledObs { row: row as u32, count })
            .collect();
        Self { n_row: counts.len(), samples }
    }

    /// Every row once.
    pub fn all_rows(n_row: usize) -> Self {
        Self::from_counts(&vec![1; n_row])
    }

    #[inline]
    pub fn n_row(&self) -> usize {
        self.n_row
    }

    #[inline]
    pub fn samples(&self) -> &[SampledObs] {
        &self.samples
    }

    /// Distinct rows in bag.
    #[inline]
    pub fn bag_count(&self) -> usize {
        self.samples.len()
    }

    /// Total draws, counting repeats.
    pub fn sample_count(&self) -> usize {
        self.samples.iter().map(|s| s.count as usize).sum()
    }

    pub fn bagged_rows(&self) -> Vec<u32> {
        self.samples.iter().map(|s| s.row).collect()
    }

    pub fn is_bagged(&self, row: usize) -> bool {
        self.samples
            .binary_search_by_key(&(row as u32), |s| s.row)
            .is_ok()
    }
}

// ============================================================================
// Sampler trait
// ============================================================================

pub trait Sampler: Send + Sync {
    fn sample(&self, n_row: usize, rng: &mut Xoshiro256PlusPlus) -> BagSample;
}

/// Sampler described by `config`.
pub fn sampler_for(config: &TrainConfig) -> Box<dyn Sampler> {
    if config.with_replacement {
        Box::new(BootstrapSampler { n_samp: config.n_samp })
    } else {
        Box::new(SubSampler { n_samp: config.n_samp })
    }
}

/// Draws `n_samp` rows (default: `n_row`) with replacement.
#[derive(Debug, Clone, Copy, Default)]
pub struct BootstrapSampler {
    pub n_samp: Option<usize>,
}

impl Sampler for BootstrapSampler {
    fn sample(&self, n_row: usize, rng: &mut Xoshiro256PlusPlus) -> BagSample {
        let mut counts = vec![0u32; n_row];
        if n_row > 0 {
            for _ in 0..self.n_samp.unwrap_or(n_row) {
                counts[rng.gen_range(0..n_row)] += 1;
            }
        }
        BagSample::from_counts(&counts)
    }
}

/// Draws `min(n_samp, n_row)` distinct rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubSampler {
    pub n_samp: Option<usize>,
}

impl Sampler for SubSampler {
    fn sample(&self, n_row: usize, rng: &mut Xoshiro256PlusPlus) -> BagSample {
        let n_samp = self.n_samp.unwrap_or(n_row).min(n_row);
        if n_samp == n_row {
            return BagSample::all_rows(n_row);
        }

        // Partial Fisher-Yates shuffle
        let mut rows: Vec<u32> = (0..n_row as u32).collect();
        for i in 0..n_samp {
            let j = rng.gen_range(i..n_row);
            rows.swap(i, j);
        }
        let mut counts = vec![0u32; n_row];
        for &row in &rows[..n_samp] {
            counts[row as usize] = 1;
        }
        BagSample::from_counts(&counts)
    }
}

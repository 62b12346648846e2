//! Interface to the split-selection service.
//!
//! The core never scores splits. A [`SplitFrontier`] sees every splittable
//! node of the current level and answers with the winning [`SplitNux`] for
//! the nodes it wants split.

use super::sampling::SampledObs;
use crate::data::TrainFrame;
use crate::tree::PtId;

/// Routing rule of one criterion.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitRule {
    /// Numeric: true iff `rank <= rank` (the cut may be fractional).
    Cut { rank: f64 },
    /// Factor: true iff the observation's code is listed.
    Bits { true_bits: Vec<u32> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct NuxCrit {
    pub pred_idx: usize,
    pub rule: SplitRule,
}

impl NuxCrit {
    pub fn cut(pred_idx: usize, rank: f64) -> Self {
        Self { pred_idx, rule: SplitRule::Cut { rank } }
    }

    pub fn bits(pred_idx: usize, true_bits: Vec<u32>) -> Self {
        Self { pred_idx, rule: SplitRule::Bits { true_bits } }
    }
}

/// A winning split for one frontier node.
///
/// More than one criterion makes a compound split: the criteria are tried in
/// order, the first that holds sends the observation to the true child, and
/// observations failing all of them go to the false child.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitNux {
    pub pt_id: PtId,
    /// Split quality, credited to the lead criterion's predictor.
    pub info: f64,
    pub criteria: Vec<NuxCrit>,
}

impl SplitNux {
    pub fn cut(pt_id: PtId, pred_idx: usize, rank: f64, info: f64) -> Self {
        Self { pt_id, info, criteria: vec![NuxCrit::cut(pred_idx, rank)] }
    }

    pub fn bits(pt_id: PtId, pred_idx: usize, true_bits: Vec<u32>, info: f64) -> Self {
        Self { pt_id, info, criteria: vec![NuxCrit::bits(pred_idx, true_bits)] }
    }

    pub fn compound(pt_id: PtId, info: f64, criteria: Vec<NuxCrit>) -> Self {
        Self { pt_id, info, criteria }
    }
}

/// A terminal offered for splitting.
#[derive(Debug, Clone, Copy)]
pub struct FrontierNode<'a> {
    pub pt_id: PtId,
    pub depth: usize,
    /// Info of the split that created this node; zero at the root.
    pub pre_info: f64,
    /// Bagged observations reaching the node.
    pub obs: &'a [SampledObs],
}

impl FrontierNode<'_> {
    /// Draws reaching the node, counting repeats.
    pub fn sample_count(&self) -> usize {
        self.obs.iter().map(|o| o.count as usize).sum()
    }
}

/// Split-selection service shared by all trees of a block.
pub trait SplitFrontier: Sync {
    /// Winning splits for any subset of `nodes`, at most one per node.
    fn split(&self, frame: &TrainFrame, nodes: &[FrontierNode<'_>]) -> Vec<SplitNux>;
}

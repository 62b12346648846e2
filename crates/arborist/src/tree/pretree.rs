//! Crescent (training-time) representation of one decision tree.
//!
//! A [`PreTree`] starts as a single terminal root and grows only by
//! converting terminals into nonterminals. Every nonterminal holds one
//! criterion and two forward deltas: observations satisfying it move to
//! `pt + true_del`, the rest to `pt + false_del`.
//!
//! A split with `k` criteria appends `k + 1` nodes: `k - 1` chained criterion
//! nodes followed by the true and false terminals. The target becomes the
//! lead. Each criterion's true branch exits to the shared true terminal and
//! its false branch moves to the next criterion, the last one to the false
//! terminal. With a single criterion this is the usual binary split, true
//! branch first. Every split therefore adds exactly one leaf.
//!
//! Once frontier splitting is done, [`PreTree::set_terminals`] binds each
//! bagged sample to its terminal, [`PreTree::leaf_merge`] enforces the leaf
//! budget and [`PreTree::consume`] writes the tree into a [`ForestCresc`]
//! node for node.

use std::ops::Range;

use rand::Rng;
use thiserror::Error;

use super::bits::SplitBits;
use super::crit::{Crit, SplitVal};
use super::merge::merge_targets;
use crate::data::TrainFrame;
use crate::forest::{ForestCresc, ForestError};
use crate::training::split::{SplitNux, SplitRule};

/// Tree-relative node index.
pub type PtId = u32;

const NO_ID: PtId = PtId::MAX;

// =============================================================================
// PreTreeError
// =============================================================================

/// A criterion or frontier map the pre-tree cannot accept.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PreTreeError {
    #[error("node {pt_id} is not a terminal of a tree of height {height}")]
    NotTerminal { pt_id: PtId, height: usize },

    #[error("split of node {pt_id} carries no criteria")]
    EmptySplit { pt_id: PtId },

    #[error("predictor {pred_idx} out of range ({n_pred} predictors)")]
    PredictorOutOfRange { pred_idx: usize, n_pred: usize },

    #[error("predictor {pred_idx}: rule does not match predictor type")]
    RuleMismatch { pred_idx: usize },

    #[error("predictor {pred_idx}: cut {cut} is not finite")]
    InvalidCut { pred_idx: usize, cut: f64 },

    #[error("predictor {pred_idx}: cut {cut} at or above missing rank {missing}")]
    CutAtMissing { pred_idx: usize, cut: f64, missing: u32 },

    #[error("predictor {pred_idx}: bit {bit} out of range for cardinality {cardinality}")]
    BitOutOfRange { pred_idx: usize, bit: u32, cardinality: u32 },

    #[error("split returned for node {pt_id}, which was not offered")]
    NotOffered { pt_id: PtId },

    #[error("sample {sample} maps to node {pt_id}, which is not a terminal")]
    FrontierNonterminal { sample: usize, pt_id: PtId },
}

// =============================================================================
// PtNode
// =============================================================================

/// Pre-tree node. Terminal iff `true_del == 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PtNode {
    true_del: u32,
    false_del: u32,
    crit_idx: u32,
    /// Criteria of the split this node leads; zero for terminals and for
    /// chained criterion nodes.
    split_len: u32,
    info: f64,
}

impl PtNode {
    #[inline]
    pub fn is_nonterminal(&self) -> bool {
        self.true_del != 0
    }

    /// Whether the node heads a split, as opposed to continuing one.
    #[inline]
    pub fn is_lead(&self) -> bool {
        self.split_len != 0
    }

    #[inline]
    pub fn true_del(&self) -> u32 {
        self.true_del
    }

    #[inline]
    pub fn false_del(&self) -> u32 {
        self.false_del
    }

    /// Criteria in the split this node leads.
    #[inline]
    pub fn split_len(&self) -> u32 {
        self.split_len
    }

    /// Split quality credited to this node, zero unless it leads a split.
    #[inline]
    pub fn info(&self) -> f64 {
        self.info
    }

    /// True and false terminals of the split led by `pt`; empty otherwise.
    #[inline]
    pub fn children(&self, pt: PtId) -> Range<PtId> {
        if self.is_lead() {
            let first = pt + self.true_del;
            first..first + 2
        } else {
            pt..pt
        }
    }

    /// Every node appended by the split led by `pt`: chained criteria, then
    /// both terminals.
    #[inline]
    pub fn split_span(&self, pt: PtId) -> Range<PtId> {
        let children = self.children(pt);
        let chained = self.split_len.saturating_sub(1);
        children.start - chained..children.end
    }
}

// =============================================================================
// PreTree
// =============================================================================

#[derive(Debug, Clone)]
pub struct PreTree {
    nodes: Vec<PtNode>,
    crits: Vec<Crit>,
    split_bits: SplitBits,
    bit_end: usize,
    leaf_count: usize,
    leaf_max: usize,
    /// Terminal holding each bagged sample.
    sample_map: Vec<PtId>,
}

impl PreTree {
    /// A single terminal root. `height_est` pre-reserves node storage;
    /// `leaf_max == 0` disables leaf merging.
    pub fn new(leaf_max: usize, height_est: usize) -> Self {
        let mut nodes = Vec::with_capacity(height_est.max(1));
        nodes.push(PtNode::default());
        Self {
            nodes,
            crits: Vec::new(),
            split_bits: SplitBits::new(),
            bit_end: 0,
            leaf_count: 1,
            leaf_max,
            sample_map: Vec::new(),
        }
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    #[inline]
    pub fn leaf_max(&self) -> usize {
        self.leaf_max
    }

    #[inline]
    pub fn bit_end(&self) -> usize {
        self.bit_end
    }

    #[inline]
    pub fn split_bits(&self) -> &SplitBits {
        &self.split_bits
    }

    #[inline]
    pub fn nodes(&self) -> &[PtNode] {
        &self.nodes
    }

    #[inline]
    pub fn node(&self, pt: PtId) -> &PtNode {
        &self.nodes[pt as usize]
    }

    #[inline]
    pub fn is_nonterminal(&self, pt: PtId) -> bool {
        self.nodes[pt as usize].is_nonterminal()
    }

    /// Criterion of the nonterminal at `pt`.
    #[inline]
    pub fn crit(&self, pt: PtId) -> Option<&Crit> {
        let node = &self.nodes[pt as usize];
        node.is_nonterminal().then(|| &self.crits[node.crit_idx as usize])
    }

    /// Criteria of the split led by `pt`, in evaluation order. A chained
    /// node yields its own criterion and a terminal none.
    pub fn crits(&self, pt: PtId) -> &[Crit] {
        let node = &self.nodes[pt as usize];
        let len = match (node.is_lead(), node.is_nonterminal()) {
            (true, _) => node.split_len as usize,
            (false, true) => 1,
            (false, false) => 0,
        };
        let start = node.crit_idx as usize;
        &self.crits[start..start + len]
    }

    /// Terminal of every bagged sample, once bound.
    #[inline]
    pub fn sample_map(&self) -> &[PtId] {
        &self.sample_map
    }

    /// Commits an externally chosen split on a terminal node.
    ///
    /// Returns the ids of the true and false terminals.
    ///
    /// # Errors
    ///
    /// The pre-tree is left untouched if the target is not a terminal or any
    /// criterion is inconsistent with `frame`.
    pub fn add_criterion(
        &mut self,
        nux: &SplitNux,
        frame: &TrainFrame,
    ) -> Result<Range<PtId>, PreTreeError> {
        let pt = nux.pt_id as usize;
        match self.nodes.get(pt) {
            Some(node) if !node.is_nonterminal() => {}
            _ => {
                return Err(PreTreeError::NotTerminal {
                    pt_id: nux.pt_id,
                    height: self.height(),
                });
            }
        }
        if nux.criteria.is_empty() {
            return Err(PreTreeError::EmptySplit { pt_id: nux.pt_id });
        }
        for crit in &nux.criteria {
            check_criterion(crit.pred_idx, &crit.rule, frame)?;
        }

        let crit_offset = self.crits.len() as u32;
        for crit in &nux.criteria {
            let pred_idx = crit.pred_idx as u32;
            match &crit.rule {
                SplitRule::Cut { rank } => self.crits.push(Crit::cut(pred_idx, *rank)),
                SplitRule::Bits { true_bits } => {
                    let cardinality = frame.cardinality(crit.pred_idx).unwrap_or(0) as usize;
                    let bit_pos = self.bit_end;
                    self.bit_end += cardinality;
                    self.split_bits.resize(self.bit_end);
                    for &bit in true_bits {
                        self.split_bits.set_bit(bit_pos + bit as usize);
                    }
                    self.crits.push(Crit::bits(pred_idx, bit_pos));
                }
            }
        }

        let n_crit = nux.criteria.len() as u32;
        let first = self.height() as PtId;
        let id_true = first + n_crit - 1;
        let id_false = id_true + 1;
        self.offspring(n_crit);

        // Criterion `j` sits on the lead for `j == 0`, else on chained node
        // `first + j - 1`.
        for j in 0..n_crit {
            let at = if j == 0 { nux.pt_id } else { first + j - 1 };
            let next = if j + 1 == n_crit { id_false } else { first + j };
            self.nodes[at as usize] = PtNode {
                true_del: id_true - at,
                false_del: next - at,
                crit_idx: crit_offset + j,
                split_len: if j == 0 { n_crit } else { 0 },
                info: if j == 0 { nux.info } else { 0.0 },
            };
        }
        Ok(id_true..id_false + 1)
    }

    /// Appends `n_crit - 1` chained nodes and two terminals; the converted
    /// terminal is replaced by two, a net gain of one leaf.
    fn offspring(&mut self, n_crit: u32) {
        let n_new = n_crit as usize + 1;
        self.nodes.resize(self.nodes.len() + n_new, PtNode::default());
        self.leaf_count += 1;
    }

    /// Next node receiving `row` from the nonterminal `pt`; `None` at a
    /// terminal.
    pub fn branch(&self, pt: PtId, frame: &TrainFrame, row: usize) -> Option<PtId> {
        let node = &self.nodes[pt as usize];
        let crit = self.crit(pt)?;
        let del = if self.holds(crit, frame, row) { node.true_del } else { node.false_del };
        Some(pt + del)
    }

    /// Terminal of the split led by `pt` that receives `row`, passing
    /// through any chained criteria; `None` unless `pt` leads a split.
    pub fn route(&self, pt: PtId, frame: &TrainFrame, row: usize) -> Option<PtId> {
        let children = self.nodes[pt as usize].children(pt);
        if children.is_empty() {
            return None;
        }
        let mut at = pt;
        while !children.contains(&at) {
            at = self.branch(at, frame, row)?;
        }
        Some(at)
    }

    fn holds(&self, crit: &Crit, frame: &TrainFrame, row: usize) -> bool {
        let pred = crit.pred_idx as usize;
        let rank = frame.rank_at(pred, row);
        match crit.val {
            SplitVal::NumericCut(cut) => f64::from(rank) <= cut,
            SplitVal::FactorBits(offset) => {
                let cardinality = frame.cardinality(pred).unwrap_or(0);
                rank < cardinality && self.split_bits.test_bit(offset + rank as usize)
            }
        }
    }

    /// Binds every bagged sample to its final terminal.
    ///
    /// # Errors
    ///
    /// [`PreTreeError::FrontierNonterminal`] if a sample maps to a
    /// nonterminal or to a node beyond the tree.
    pub fn set_terminals(&mut self, sample_map: Vec<PtId>) -> Result<(), PreTreeError> {
        for (sample, &pt_id) in sample_map.iter().enumerate() {
            match self.nodes.get(pt_id as usize) {
                Some(node) if !node.is_nonterminal() => {}
                _ => return Err(PreTreeError::FrontierNonterminal { sample, pt_id }),
            }
        }
        self.sample_map = sample_map;
        Ok(())
    }

    /// Collapses randomly chosen mergeable splits until the leaf budget is
    /// met, compacts the node vector and remaps the sample map.
    ///
    /// Each merge removes one leaf, so exactly `leaf_count - leaf_max`
    /// merges are performed when over budget. A budget of zero disables
    /// merging.
    pub fn leaf_merge<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        if self.leaf_max == 0 || self.leaf_count <= self.leaf_max {
            return 0;
        }
        let (mut arena, merges) =
            merge_targets(&self.nodes, self.leaf_count, self.leaf_max, rng);

        // Splits are appended after their lead, so one pass pushes roots all
        // the way down.
        for pt in 0..self.nodes.len() {
            if let Some(root) = arena[pt].root {
                for member in self.nodes[pt].split_span(pt as PtId) {
                    arena[member as usize].root = Some(root);
                }
            }
        }

        let mut id_merged = vec![NO_ID; self.nodes.len()];
        let mut next: PtId = 0;
        for (pt, entry) in arena.iter().enumerate() {
            if entry.root.map_or(true, |root| root as usize == pt) {
                id_merged[pt] = next;
                next += 1;
            }
        }

        let mut compact = Vec::with_capacity(next as usize);
        for (pt, node) in self.nodes.iter().enumerate() {
            let new_id = id_merged[pt];
            if new_id == NO_ID {
                continue;
            }
            let mut node = *node;
            if arena[pt].root.is_some() {
                node = PtNode::default();
            } else if node.is_nonterminal() {
                let id_true = id_merged[pt + node.true_del as usize];
                let id_false = id_merged[pt + node.false_del as usize];
                debug_assert!(id_true != NO_ID && id_false != NO_ID, "target of retained node merged away");
                node.true_del = id_true - new_id;
                node.false_del = id_false - new_id;
            }
            compact.push(node);
        }

        for pt_id in self.sample_map.iter_mut() {
            let target = arena[*pt_id as usize].root.unwrap_or(*pt_id);
            *pt_id = id_merged[target as usize];
        }

        self.nodes = compact;
        self.leaf_count -= merges;
        debug_assert_eq!(
            self.leaf_count,
            self.nodes.iter().filter(|n| !n.is_nonterminal()).count()
        );
        merges
    }

    /// Leaf index of every terminal, assigned in node order; `None` for
    /// nonterminals.
    pub fn leaf_indices(&self) -> Vec<Option<u32>> {
        let mut next = 0;
        self.nodes
            .iter()
            .map(|node| {
                (!node.is_nonterminal()).then(|| {
                    next += 1;
                    next - 1
                })
            })
            .collect()
    }

    /// Leaf index of every bagged sample.
    pub fn sample_leaves(&self) -> Vec<u32> {
        let leaves = self.leaf_indices();
        self.sample_map
            .iter()
            .map(|&pt| leaves[pt as usize].unwrap_or(u32::MAX))
            .collect()
    }

    /// Writes the tree into `forest` as tree `t_idx`, node for node,
    /// crediting each split's info to its leading predictor in `pred_info`.
    /// Returns the leaf index of every bagged sample.
    ///
    /// # Errors
    ///
    /// [`ForestError::PredInfoTooShort`] if a split's predictor has no
    /// `pred_info` entry, checked before anything is written. Otherwise
    /// propagates [`ForestError`] if `t_idx` is not the forest's next tree.
    pub fn consume(
        &self,
        forest: &mut ForestCresc,
        t_idx: usize,
        pred_info: &mut [f64],
    ) -> Result<Vec<u32>, ForestError> {
        let n_pred = pred_info.len();
        if let Some(crit) = self.crits.iter().find(|crit| crit.pred_idx as usize >= n_pred) {
            return Err(ForestError::PredInfoTooShort { pred_idx: crit.pred_idx as usize, n_pred });
        }
        forest.tree_init(t_idx, self.nodes.len())?;

        let mut leaf_idx = 0;
        for (pt, node) in self.nodes.iter().enumerate() {
            let crit = self.crits.get(node.crit_idx as usize).filter(|_| node.is_nonterminal());
            let Some(crit) = crit else {
                forest.terminal(pt, leaf_idx)?;
                leaf_idx += 1;
                continue;
            };
            if node.is_lead() {
                pred_info[crit.pred_idx as usize] += node.info;
            }
            forest.nonterminal(pt, node.true_del, node.false_del, *crit)?;
        }
        forest.append_bits(&self.split_bits, self.bit_end, t_idx)?;
        Ok(self.sample_leaves())
    }
}

fn check_criterion(pred_idx: usize, rule: &SplitRule, frame: &TrainFrame) -> Result<(), PreTreeError> {
    if pred_idx >= frame.n_pred() {
        return Err(PreTreeError::PredictorOutOfRange { pred_idx, n_pred: frame.n_pred() });
    }
    match (rule, frame.cardinality(pred_idx)) {
        (SplitRule::Cut { rank }, None) => {
            if !rank.is_finite() {
                return Err(PreTreeError::InvalidCut { pred_idx, cut: *rank });
            }
            // Missing observations compare false against any value cut.
            match frame.missing_rank(pred_idx) {
                Some(missing) if *rank >= f64::from(missing) => {
                    Err(PreTreeError::CutAtMissing { pred_idx, cut: *rank, missing })
                }
                _ => Ok(()),
            }
        }
        (SplitRule::Bits { true_bits }, Some(cardinality)) => {
            match true_bits.iter().find(|&&bit| bit >= cardinality) {
                Some(&bit) => Err(PreTreeError::BitOutOfRange { pred_idx, bit, cardinality }),
                None => Ok(()),
            }
        }
        _ => Err(PreTreeError::RuleMismatch { pred_idx }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ObservationFrameBuilder;
    use crate::training::split::NuxCrit;
    use crate::utils::Parallelism;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    /// Rows 0..8: numeric `x = row`, factor `f = row % 4` with 4 levels.
    fn frame() -> TrainFrame {
        let x: Vec<f64> = (0..8).map(f64::from).collect();
        let f: Vec<u32> = (0..8).map(|r| r % 4).collect();
        let frame = ObservationFrameBuilder::new(8)
            .numeric_column(&x)
            .factor_column(&f, 4)
            .build(Parallelism::Sequential)
            .unwrap();
        TrainFrame::new(frame, 0.25, Parallelism::Sequential).unwrap()
    }

    #[test]
    fn test_new_tree_is_single_leaf() {
        let tree = PreTree::new(0, 16);
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.leaf_count(), 1);
        assert!(!tree.is_nonterminal(0));
    }

    #[test]
    fn test_numeric_split_routes_by_rank() {
        let tf = frame();
        let mut tree = PreTree::new(0, 4);
        let children = tree.add_criterion(&SplitNux::cut(0, 0, 3.5, 2.0), &tf).unwrap();

        assert_eq!(children, 1..3);
        assert_eq!(tree.height(), 3);
        assert_eq!(tree.leaf_count(), 2);
        assert_eq!(tree.node(0).true_del(), 1);
        assert_eq!(tree.node(0).false_del(), 2);
        assert_eq!(tree.branch(0, &tf, 3), Some(1));
        assert_eq!(tree.branch(0, &tf, 4), Some(2));
        assert_eq!(tree.branch(1, &tf, 0), None);
    }

    #[test]
    fn test_factor_split_records_bits() {
        let tf = frame();
        let mut tree = PreTree::new(0, 4);
        tree.add_criterion(&SplitNux::bits(0, 1, vec![1, 3], 1.0), &tf).unwrap();

        assert_eq!(tree.bit_end(), 4);
        assert_eq!(tree.crits(0), &[Crit::bits(1, 0)]);
        assert_eq!(tree.branch(0, &tf, 1), Some(1));
        assert_eq!(tree.branch(0, &tf, 7), Some(1));
        assert_eq!(tree.branch(0, &tf, 2), Some(2));

        tree.add_criterion(&SplitNux::bits(2, 1, vec![0], 1.0), &tf).unwrap();
        assert_eq!(tree.crits(2), &[Crit::bits(1, 4)]);
        assert_eq!(tree.bit_end(), 8);
    }

    #[test]
    fn test_compound_split_adds_one_leaf() {
        let tf = frame();
        let mut tree = PreTree::new(0, 8);
        let nux = SplitNux::compound(
            0,
            1.0,
            vec![
                NuxCrit::cut(0, 1.0),
                NuxCrit::bits(1, vec![3]),
            ],
        );
        let children = tree.add_criterion(&nux, &tf).unwrap();

        // Chained criterion at 1, true terminal 2, false terminal 3.
        assert_eq!(children, 2..4);
        assert_eq!(tree.height(), 4);
        assert_eq!(tree.leaf_count(), 2);
        assert!(tree.node(0).is_lead());
        assert!(tree.is_nonterminal(1) && !tree.node(1).is_lead());
        assert_eq!(tree.node(0).split_span(0), 1..4);
        assert_eq!(tree.crits(0).len(), 2);

        assert_eq!(tree.branch(0, &tf, 0), Some(2));
        assert_eq!(tree.branch(0, &tf, 3), Some(1));
        assert_eq!(tree.branch(1, &tf, 3), Some(2));
        assert_eq!(tree.route(0, &tf, 0), Some(2));
        assert_eq!(tree.route(0, &tf, 7), Some(2));
        assert_eq!(tree.route(0, &tf, 5), Some(3));
        assert_eq!(tree.route(1, &tf, 5), None);
    }

    #[test]
    fn test_compound_merge_removes_one_leaf() {
        let tf = frame();
        let mut tree = PreTree::new(2, 8);
        tree.add_criterion(&SplitNux::cut(0, 0, 3.5, 1.0), &tf).unwrap();
        let nux = SplitNux::compound(
            2,
            1.0,
            vec![
                NuxCrit::cut(0, 4.5),
                NuxCrit::bits(1, vec![2]),
                NuxCrit::cut(0, 5.5),
            ],
        );
        tree.add_criterion(&nux, &tf).unwrap();
        assert_eq!(tree.leaf_count(), 3);
        assert_eq!(tree.height(), 7);
        let map = (0..8).map(|row| {
            let mut pt = 0;
            while let Some(next) = tree.branch(pt, &tf, row) {
                pt = next;
            }
            pt
        }).collect();
        tree.set_terminals(map).unwrap();

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        assert_eq!(tree.leaf_merge(&mut rng), 1);
        assert_eq!(tree.leaf_count(), 2);
        assert_eq!(tree.height(), 3);
        assert_eq!(tree.sample_leaves(), vec![0, 0, 0, 0, 1, 1, 1, 1]);
    }

    #[test]
    fn test_cut_at_missing_rank_rejected() {
        let frame = ObservationFrameBuilder::new(5)
            .numeric_column(&[3.1, 1.0, 1.0, 7.2, f64::NAN])
            .build(Parallelism::Sequential)
            .unwrap();
        let tf = TrainFrame::new(frame, 0.25, Parallelism::Sequential).unwrap();
        let mut tree = PreTree::new(0, 4);
        assert_eq!(
            tree.add_criterion(&SplitNux::cut(0, 0, 3.0, 1.0), &tf),
            Err(PreTreeError::CutAtMissing { pred_idx: 0, cut: 3.0, missing: 3 })
        );
        assert_eq!(tree.height(), 1);
        assert!(tree.add_criterion(&SplitNux::cut(0, 0, 2.5, 1.0), &tf).is_ok());
    }

    #[test]
    fn test_consume_checks_pred_info_first() {
        let tf = frame();
        let mut tree = PreTree::new(0, 4);
        tree.add_criterion(&SplitNux::bits(0, 1, vec![0], 1.0), &tf).unwrap();
        let mut forest = ForestCresc::new(1);
        let mut pred_info = vec![0.0; 1];
        assert_eq!(
            tree.consume(&mut forest, 0, &mut pred_info),
            Err(ForestError::PredInfoTooShort { pred_idx: 1, n_pred: 1 })
        );
        assert_eq!(forest.tree_count(), 0);
    }

    #[test]
    fn test_rejected_criteria_leave_tree_untouched() {
        let tf = frame();
        let mut tree = PreTree::new(0, 4);
        assert_eq!(
            tree.add_criterion(&SplitNux::cut(0, 1, 0.5, 1.0), &tf),
            Err(PreTreeError::RuleMismatch { pred_idx: 1 })
        );
        assert_eq!(
            tree.add_criterion(&SplitNux::bits(0, 1, vec![4], 1.0), &tf),
            Err(PreTreeError::BitOutOfRange { pred_idx: 1, bit: 4, cardinality: 4 })
        );
        assert!(matches!(
            tree.add_criterion(&SplitNux::cut(0, 0, f64::NAN, 1.0), &tf),
            Err(PreTreeError::InvalidCut { pred_idx: 0, .. })
        ));
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.bit_end(), 0);

        tree.add_criterion(&SplitNux::cut(0, 0, 3.5, 1.0), &tf).unwrap();
        assert!(matches!(
            tree.add_criterion(&SplitNux::cut(0, 0, 1.5, 1.0), &tf),
            Err(PreTreeError::NotTerminal { pt_id: 0, .. })
        ));
    }

    #[test]
    fn test_set_terminals_rejects_nonterminal() {
        let tf = frame();
        let mut tree = PreTree::new(0, 4);
        tree.add_criterion(&SplitNux::cut(0, 0, 3.5, 1.0), &tf).unwrap();
        assert_eq!(
            tree.set_terminals(vec![1, 0, 2]),
            Err(PreTreeError::FrontierNonterminal { sample: 1, pt_id: 0 })
        );
        assert!(tree.set_terminals(vec![1, 2, 2]).is_ok());
    }

    /// Full binary tree of depth 3 over rows 0..8, one sample per row.
    fn full_tree(leaf_max: usize) -> PreTree {
        let tf = frame();
        let mut tree = PreTree::new(leaf_max, 16);
        tree.add_criterion(&SplitNux::cut(0, 0, 3.5, 4.0), &tf).unwrap();
        tree.add_criterion(&SplitNux::cut(1, 0, 1.5, 2.0), &tf).unwrap();
        tree.add_criterion(&SplitNux::cut(2, 0, 5.5, 2.0), &tf).unwrap();
        for pt in 3..7 {
            let cut = 2.0 * f64::from(pt - 3) + 0.5;
            tree.add_criterion(&SplitNux::cut(pt, 0, cut, 1.0), &tf).unwrap();
        }
        let map: Vec<PtId> = (0..8).map(|row| {
            let mut pt = 0;
            while let Some(child) = tree.branch(pt, &tf, row) {
                pt = child;
            }
            pt
        }).collect();
        tree.set_terminals(map).unwrap();
        tree
    }

    #[test]
    fn test_full_tree_shape() {
        let tree = full_tree(0);
        assert_eq!(tree.height(), 15);
        assert_eq!(tree.leaf_count(), 8);
        let leaves = tree.sample_leaves();
        assert_eq!(leaves, (0..8).collect::<Vec<u32>>());
    }

    #[test]
    fn test_leaf_merge_meets_budget() {
        for leaf_max in 1..=8 {
            let mut tree = full_tree(leaf_max);
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(leaf_max as u64);
            let merges = tree.leaf_merge(&mut rng);

            assert_eq!(merges, 8 - leaf_max);
            assert_eq!(tree.leaf_count(), leaf_max);
            assert_eq!(tree.height(), 2 * leaf_max - 1);
            for &pt in tree.sample_map() {
                assert!(!tree.is_nonterminal(pt));
            }
            let leaves = tree.sample_leaves();
            assert!(leaves.iter().all(|&l| (l as usize) < leaf_max));
        }
    }

    #[test]
    fn test_leaf_merge_disabled() {
        let mut tree = full_tree(0);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        assert_eq!(tree.leaf_merge(&mut rng), 0);
        assert_eq!(tree.leaf_count(), 8);
    }

    #[test]
    fn test_leaf_merge_keeps_children_reachable() {
        let mut tree = full_tree(3);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
        tree.leaf_merge(&mut rng);
        for pt in 0..tree.height() as PtId {
            for child in tree.node(pt).children(pt) {
                assert!(child > pt && (child as usize) < tree.height());
            }
        }
    }
}

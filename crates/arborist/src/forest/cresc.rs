//! Forest-wide accumulation of consumed trees.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::node::{pack_nodes, unpack_nodes, TreeNode};
use crate::data::TrainFrame;
use crate::tree::{Crit, SplitBits, SplitVal};

// =============================================================================
// ForestError
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForestError {
    #[error("tree {actual} consumed out of order, expected tree {expected}")]
    TreeOutOfOrder { expected: usize, actual: usize },

    #[error("forest was declared with {n_tree} trees")]
    TooManyTrees { n_tree: usize },

    #[error("no tree is open for writing")]
    NoOpenTree,

    #[error("node {node_idx} outside tree of {node_count} nodes")]
    NodeOutOfRange { node_idx: usize, node_count: usize },

    #[error("buffer of {len} bytes is not a multiple of {width}")]
    Misaligned { len: usize, width: usize },

    #[error("height vector is not cumulative at tree {tree}")]
    BadHeight { tree: usize },

    #[error("split on predictor {pred_idx} but info is tracked for {n_pred} predictors")]
    PredInfoTooShort { pred_idx: usize, n_pred: usize },
}

// =============================================================================
// Blocks
// =============================================================================

/// Nodes of every consumed tree, with cumulative per-tree heights.
#[derive(Debug, Clone, Default)]
pub struct NodeBlock {
    nodes: Vec<TreeNode>,
    /// `height[t]`: nodes in trees `0..=t`.
    height: Vec<usize>,
    /// First node of the tree being written.
    tree_floor: usize,
}

impl NodeBlock {
    #[inline]
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    #[inline]
    pub fn height(&self) -> &[usize] {
        &self.height
    }

    /// Nodes of tree `t_idx`.
    pub fn tree(&self, t_idx: usize) -> &[TreeNode] {
        let start = if t_idx == 0 { 0 } else { self.height[t_idx - 1] };
        &self.nodes[start..self.height[t_idx]]
    }
}

/// Factor split bits of every consumed tree, in `u32` slots.
#[derive(Debug, Clone, Default)]
pub struct FactorBlock {
    slots: Vec<u32>,
    /// `fac_height[t]`: slots in trees `0..=t`.
    fac_height: Vec<usize>,
}

impl FactorBlock {
    #[inline]
    pub fn slots(&self) -> &[u32] {
        &self.slots
    }

    #[inline]
    pub fn fac_height(&self) -> &[usize] {
        &self.fac_height
    }

    /// Split bits of tree `t_idx`, addressed by tree-relative offsets.
    pub fn tree(&self, t_idx: usize) -> SplitBits {
        let start = if t_idx == 0 { 0 } else { self.fac_height[t_idx - 1] };
        let slots = self.slots[start..self.fac_height[t_idx]].to_vec();
        let n_bit = slots.len() * crate::tree::SLOT_BITS;
        SplitBits::from_slots(slots, n_bit)
    }
}

// =============================================================================
// ForestCresc
// =============================================================================

/// Crescent forest: trees are appended in index order and never modified
/// afterwards, except for the one-time interpolation of numeric cuts.
#[derive(Debug, Clone)]
pub struct ForestCresc {
    n_tree: usize,
    node_block: NodeBlock,
    fac_block: FactorBlock,
    /// Nodes before this index carry cuts in predictor units.
    updated: usize,
}

impl ForestCresc {
    pub fn new(n_tree: usize) -> Self {
        Self {
            n_tree,
            node_block: NodeBlock {
                height: Vec::with_capacity(n_tree),
                ..NodeBlock::default()
            },
            fac_block: FactorBlock {
                fac_height: Vec::with_capacity(n_tree),
                ..FactorBlock::default()
            },
            updated: 0,
        }
    }

    /// Reserves room for `n_node` more nodes.
    pub fn reserve(&mut self, n_node: usize) {
        self.node_block.nodes.reserve(n_node);
    }

    /// Trees declared at construction.
    #[inline]
    pub fn n_tree(&self) -> usize {
        self.n_tree
    }

    /// Trees opened so far.
    #[inline]
    pub fn tree_count(&self) -> usize {
        self.node_block.height.len()
    }

    #[inline]
    pub fn node_block(&self) -> &NodeBlock {
        &self.node_block
    }

    #[inline]
    pub fn fac_block(&self) -> &FactorBlock {
        &self.fac_block
    }

    #[inline]
    pub fn height(&self) -> &[usize] {
        &self.node_block.height
    }

    #[inline]
    pub fn fac_height(&self) -> &[usize] {
        &self.fac_block.fac_height
    }

    /// Opens tree `t_idx` with `node_count` leaf-initialized slots.
    ///
    /// # Errors
    ///
    /// Trees must be opened in index order and within the declared count.
    pub fn tree_init(&mut self, t_idx: usize, node_count: usize) -> Result<(), ForestError> {
        let expected = self.tree_count();
        if t_idx != expected {
            return Err(ForestError::TreeOutOfOrder { expected, actual: t_idx });
        }
        if t_idx >= self.n_tree {
            return Err(ForestError::TooManyTrees { n_tree: self.n_tree });
        }
        let block = &mut self.node_block;
        block.tree_floor = block.nodes.len();
        block.nodes.resize(block.tree_floor + node_count, TreeNode::default());
        block.height.push(block.nodes.len());
        Ok(())
    }

    fn slot(&mut self, node_idx: usize) -> Result<&mut TreeNode, ForestError> {
        let block = &mut self.node_block;
        if block.height.is_empty() {
            return Err(ForestError::NoOpenTree);
        }
        let node_count = block.nodes.len() - block.tree_floor;
        if node_idx >= node_count {
            return Err(ForestError::NodeOutOfRange { node_idx, node_count });
        }
        Ok(&mut block.nodes[block.tree_floor + node_idx])
    }

    /// Writes a split at tree-relative `node_idx`. Both targets,
    /// `node_idx + true_del` and `node_idx + false_del`, must follow the
    /// split and lie in the tree.
    pub fn nonterminal(
        &mut self,
        node_idx: usize,
        true_del: u32,
        false_del: u32,
        crit: Crit,
    ) -> Result<(), ForestError> {
        let node_count = self.node_block.nodes.len() - self.node_block.tree_floor;
        for del in [true_del, false_del] {
            let target = node_idx + del as usize;
            if del == 0 || target >= node_count {
                return Err(ForestError::NodeOutOfRange { node_idx: target, node_count });
            }
        }
        *self.slot(node_idx)? = TreeNode::Split { true_del, false_del, crit };
        Ok(())
    }

    pub fn terminal(&mut self, node_idx: usize, leaf_idx: u32) -> Result<(), ForestError> {
        *self.slot(node_idx)? = TreeNode::Leaf { leaf_idx };
        Ok(())
    }

    /// Copies the first `bit_end` bits of tree `t_idx`, rounded up to whole
    /// slots, into the factor block.
    pub fn append_bits(
        &mut self,
        bits: &SplitBits,
        bit_end: usize,
        t_idx: usize,
    ) -> Result<(), ForestError> {
        let expected = self.fac_block.fac_height.len();
        if t_idx != expected || t_idx >= self.tree_count() {
            return Err(ForestError::TreeOutOfOrder { expected, actual: t_idx });
        }
        self.fac_block.slots.extend_from_slice(bits.aligned_slots(bit_end));
        self.fac_block.fac_height.push(self.fac_block.slots.len());
        Ok(())
    }

    /// Replaces rank-valued numeric cuts written since the last update with
    /// their interpolated values in predictor units.
    pub fn split_update(&mut self, frame: &TrainFrame) {
        let nodes = &mut self.node_block.nodes[self.updated..];
        for node in nodes.iter_mut() {
            if let TreeNode::Split { crit, .. } = node {
                if let SplitVal::NumericCut(rank) = crit.val {
                    if let Some(cut) = frame.interpolate(crit.pred_idx as usize, rank) {
                        crit.val = SplitVal::NumericCut(cut);
                    }
                }
            }
        }
        self.updated = self.node_block.nodes.len();
    }

    /// Byte-level copy of the forest.
    pub fn dump(&self) -> RawForest {
        RawForest {
            nodes: pack_nodes(&self.node_block.nodes),
            height: self.node_block.height.iter().map(|&h| h as u64).collect(),
            fac_bits: self
                .fac_block
                .slots
                .iter()
                .flat_map(|slot| slot.to_le_bytes())
                .collect(),
            fac_height: self.fac_block.fac_height.iter().map(|&h| h as u64).collect(),
        }
    }
}

// =============================================================================
// RawForest
// =============================================================================

/// Forest as contiguous little-endian buffers.
///
/// `height` and `fac_height` are cumulative, in nodes and `u32` slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawForest {
    pub nodes: Vec<u8>,
    pub height: Vec<u64>,
    pub fac_bits: Vec<u8>,
    pub fac_height: Vec<u64>,
}

impl RawForest {
    #[inline]
    pub fn n_tree(&self) -> usize {
        self.height.len()
    }

    /// Checks that both height vectors are cumulative and match the buffers.
    pub fn validate(&self) -> Result<(), ForestError> {
        check_cumulative(&self.height, self.nodes.len(), super::NODE_BYTES)?;
        check_cumulative(&self.fac_height, self.fac_bits.len(), 4)?;
        if self.fac_height.len() != self.height.len() {
            return Err(ForestError::BadHeight { tree: self.fac_height.len().min(self.height.len()) });
        }
        Ok(())
    }

    pub fn unpack_nodes(&self, fac_first: usize) -> Result<Vec<TreeNode>, ForestError> {
        unpack_nodes(&self.nodes, fac_first)
    }

    pub fn unpack_fac_slots(&self) -> Result<Vec<u32>, ForestError> {
        if self.fac_bits.len() % 4 != 0 {
            return Err(ForestError::Misaligned { len: self.fac_bits.len(), width: 4 });
        }
        Ok(self
            .fac_bits
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}

fn check_cumulative(height: &[u64], len: usize, width: usize) -> Result<(), ForestError> {
    if len % width != 0 {
        return Err(ForestError::Misaligned { len, width });
    }
    let mut prev = 0;
    for (tree, &h) in height.iter().enumerate() {
        if h < prev {
            return Err(ForestError::BadHeight { tree });
        }
        prev = h;
    }
    if prev as usize != len / width {
        return Err(ForestError::BadHeight { tree: height.len().saturating_sub(1) });
    }
    Ok(())
}

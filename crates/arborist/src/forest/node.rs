//! Forest node representation and its fixed-width byte layout.
//!
//! # Layout
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       4     pred_idx (leaf index for leaves)
//! 4       4     true_del (0 for leaves)
//! 8       4     false_del (0 for leaves)
//! 12      8     payload: f64 bits of a numeric cut, or a factor bit offset
//! ```
//!
//! All fields are little-endian. The payload arm is not stored; it follows
//! from `pred_idx` relative to the first factor predictor.

use super::cresc::ForestError;
use crate::tree::{Crit, SplitVal};

/// Bytes per packed node.
pub const NODE_BYTES: usize = 20;

/// One node of a consumed tree.
///
/// A split sends observations satisfying `crit` to `self + true_del` and the
/// rest to `self + false_del`. Both targets follow the split. Binary splits
/// have adjacent targets; the criteria of a compound split share their
/// true target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TreeNode {
    Leaf { leaf_idx: u32 },
    Split { true_del: u32, false_del: u32, crit: Crit },
}

impl Default for TreeNode {
    fn default() -> Self {
        Self::Leaf { leaf_idx: 0 }
    }
}

impl TreeNode {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. })
    }

    /// Offset of the node receiving an observation, `None` at a leaf.
    #[inline]
    pub fn next(&self, holds: bool) -> Option<usize> {
        match *self {
            Self::Leaf { .. } => None,
            Self::Split { true_del, false_del, .. } => {
                let del = if holds { true_del } else { false_del };
                Some(del as usize)
            }
        }
    }

    pub fn to_bytes(&self) -> [u8; NODE_BYTES] {
        let (pred_idx, true_del, false_del, payload) = match *self {
            Self::Leaf { leaf_idx } => (leaf_idx, 0, 0, 0),
            Self::Split { true_del, false_del, crit } => {
                let payload = match crit.val {
                    SplitVal::NumericCut(cut) => cut.to_bits(),
                    SplitVal::FactorBits(offset) => offset as u64,
                };
                (crit.pred_idx, true_del, false_del, payload)
            }
        };
        let mut buf = [0u8; NODE_BYTES];
        buf[0..4].copy_from_slice(&pred_idx.to_le_bytes());
        buf[4..8].copy_from_slice(&true_del.to_le_bytes());
        buf[8..12].copy_from_slice(&false_del.to_le_bytes());
        buf[12..20].copy_from_slice(&payload.to_le_bytes());
        buf
    }

    /// Decodes one node. Predictors at or beyond `fac_first` are factors.
    pub fn from_bytes(buf: &[u8; NODE_BYTES], fac_first: usize) -> Self {
        let pred_idx = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let true_del = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let false_del = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
        let mut payload = [0u8; 8];
        payload.copy_from_slice(&buf[12..20]);
        let payload = u64::from_le_bytes(payload);

        if true_del == 0 {
            return Self::Leaf { leaf_idx: pred_idx };
        }
        let crit = if pred_idx as usize >= fac_first {
            Crit::bits(pred_idx, payload as usize)
        } else {
            Crit::cut(pred_idx, f64::from_bits(payload))
        };
        Self::Split { true_del, false_del, crit }
    }
}

/// Packs nodes back to back.
pub fn pack_nodes(nodes: &[TreeNode]) -> Vec<u8> {
    let mut out = Vec::with_capacity(nodes.len() * NODE_BYTES);
    for node in nodes {
        out.extend_from_slice(&node.to_bytes());
    }
    out
}

/// Inverse of [`pack_nodes`].
///
/// # Errors
///
/// [`ForestError::Misaligned`] if the buffer is not a whole number of nodes.
pub fn unpack_nodes(bytes: &[u8], fac_first: usize) -> Result<Vec<TreeNode>, ForestError> {
    if bytes.len() % NODE_BYTES != 0 {
        return Err(ForestError::Misaligned { len: bytes.len(), width: NODE_BYTES });
    }
    Ok(bytes
        .chunks_exact(NODE_BYTES)
        .map(|chunk| {
            let mut buf = [0u8; NODE_BYTES];
            buf.copy_from_slice(chunk);
            TreeNode::from_bytes(&buf, fac_first)
        })
        .collect())
}

//! Forest-wide storage for consumed trees.
//!
//! [`ForestCresc`] accumulates trees one at a time in index order. Its
//! [`RawForest`] dump is the byte-level handoff to prediction and persistence.

mod cresc;
mod node;

pub use cresc::{FactorBlock, ForestCresc, ForestError, NodeBlock, RawForest};
pub use node::{pack_nodes, unpack_nodes, TreeNode, NODE_BYTES};

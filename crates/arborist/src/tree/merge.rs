//! Leaf merging: randomized pruning to a leaf budget.
//!
//! Every node draws a uniform random priority. Splits whose true and false
//! terminals are both leaves are mergeable and wait in a min-priority queue,
//! keyed by their lead; popping one collapses the whole split, chained
//! criteria included, into a single leaf. That may in turn make the
//! enclosing split mergeable.
//! Records live in an index arena parallel to the pre-tree's node vector and
//! are dropped once the tree is compacted.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rand::Rng;

use super::pretree::{PtId, PtNode};

/// Merge workspace for one pre-tree node.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PtMerge {
    /// Random tie-break priority.
    pub info: f64,
    /// Lead of the split this node terminates.
    pub par_id: Option<PtId>,
    /// Children that still lead unmerged splits.
    pub pending: u32,
    /// Ancestor this node was merged into, itself if it was popped.
    pub root: Option<PtId>,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    info: f64,
    pt_id: PtId,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    // Reversed: `BinaryHeap` is a max-heap and the lowest priority pops first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .info
            .total_cmp(&self.info)
            .then_with(|| other.pt_id.cmp(&self.pt_id))
    }
}

/// Pops mergeable splits until `leaf_max` leaves remain. Returns the arena,
/// with `root` set on popped leads only, and the number of merges.
pub(crate) fn merge_targets<R: Rng + ?Sized>(
    nodes: &[PtNode],
    leaf_count: usize,
    leaf_max: usize,
    rng: &mut R,
) -> (Vec<PtMerge>, usize) {
    let mut arena: Vec<PtMerge> = nodes
        .iter()
        .map(|_| PtMerge {
            info: rng.gen::<f64>(),
            par_id: None,
            pending: 0,
            root: None,
        })
        .collect();

    for (pt, node) in nodes.iter().enumerate() {
        for child in node.children(pt as PtId) {
            arena[child as usize].par_id = Some(pt as PtId);
            if nodes[child as usize].is_lead() {
                arena[pt].pending += 1;
            }
        }
    }

    let mut queue: BinaryHeap<Candidate> = nodes
        .iter()
        .enumerate()
        .filter(|(pt, node)| node.is_lead() && arena[*pt].pending == 0)
        .map(|(pt, _)| Candidate { info: arena[pt].info, pt_id: pt as PtId })
        .collect();

    let mut leaves = leaf_count;
    let mut merges = 0;
    while leaves > leaf_max {
        let Some(Candidate { pt_id, .. }) = queue.pop() else {
            break;
        };
        let pt = pt_id as usize;
        arena[pt].root = Some(pt_id);
        leaves -= 1;
        merges += 1;

        if let Some(par) = arena[pt].par_id {
            let parent = &mut arena[par as usize];
            parent.pending -= 1;
            if parent.pending == 0 {
                queue.push(Candidate { info: parent.info, pt_id: par });
            }
        }
    }
    (arena, merges)
}

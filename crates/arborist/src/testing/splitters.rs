use std::collections::HashMap;

use crate::data::{Rank, TrainFrame};
use crate::training::split::{FrontierNode, SplitFrontier, SplitNux};
use crate::tree::PtId;

/// Never splits; every tree stays a single leaf.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSplit;

impl SplitFrontier for NoSplit {
    fn split(&self, _frame: &TrainFrame, _nodes: &[FrontierNode<'_>]) -> Vec<SplitNux> {
        Vec::new()
    }
}

/// Replays fixed splits keyed by node id, in frontier order.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSplitter {
    script: HashMap<PtId, SplitNux>,
    stray: Option<SplitNux>,
}

impl ScriptedSplitter {
    pub fn new(script: Vec<SplitNux>) -> Self {
        Self {
            script: script.into_iter().map(|nux| (nux.pt_id, nux)).collect(),
            stray: None,
        }
    }

    /// Also returns `nux` at every level, offered or not.
    pub fn with_stray(mut self, nux: SplitNux) -> Self {
        self.stray = Some(nux);
        self
    }
}

impl SplitFrontier for ScriptedSplitter {
    fn split(&self, _frame: &TrainFrame, nodes: &[FrontierNode<'_>]) -> Vec<SplitNux> {
        nodes
            .iter()
            .filter_map(|node| self.script.get(&node.pt_id).cloned())
            .chain(self.stray.clone())
            .collect()
    }
}

/// Splits each node at the median distinct rank of one predictor.
///
/// Predictors are tried round-robin from `depth + pt_id`; the first one with
/// two or more non-missing ranks in the node wins. Factors send the lower
/// half of their observed codes to the true branch. Info is the node's
/// sample count.
#[derive(Debug, Clone, Copy, Default)]
pub struct MedianSplitter;

impl MedianSplitter {
    fn split_on(frame: &TrainFrame, node: &FrontierNode<'_>, pred: usize) -> Option<SplitNux> {
        let missing = frame.missing_rank(pred);
        let mut ranks: Vec<Rank> = node
            .obs
            .iter()
            .map(|o| frame.rank_at(pred, o.row as usize))
            .filter(|&rank| Some(rank) != missing)
            .collect();
        ranks.sort_unstable();
        ranks.dedup();
        if ranks.len() < 2 {
            return None;
        }

        let info = node.sample_count() as f64;
        match frame.cardinality(pred) {
            None => {
                let cut = f64::from(ranks[(ranks.len() - 1) / 2]) + 0.5;
                Some(SplitNux::cut(node.pt_id, pred, cut, info))
            }
            Some(_) => {
                let true_bits = ranks[..ranks.len() / 2].to_vec();
                Some(SplitNux::bits(node.pt_id, pred, true_bits, info))
            }
        }
    }
}

impl SplitFrontier for MedianSplitter {
    fn split(&self, frame: &TrainFrame, nodes: &[FrontierNode<'_>]) -> Vec<SplitNux> {
        let n_pred = frame.n_pred();
        nodes
            .iter()
            .filter_map(|node| {
                (0..n_pred)
                    .map(|k| (node.depth + node.pt_id as usize + k) % n_pred)
                    .find_map(|pred| Self::split_on(frame, node, pred))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::sampling::SampledObs;
    use crate::testing::data::random_train_frame;

    #[test]
    fn test_median_split_separates_node() {
        let frame = random_train_frame(60, 2, 2, 5).unwrap();
        let obs: Vec<SampledObs> = (0..60).map(|row| SampledObs { row, count: 1 }).collect();
        let node = FrontierNode { pt_id: 0, depth: 0, pre_info: 0.0, obs: &obs };
        let nuxes = MedianSplitter.split(&frame, &[node]);

        assert_eq!(nuxes.len(), 1);
        assert_eq!(nuxes[0].criteria[0].pred_idx, 0);
        assert_eq!(nuxes[0].info, 60.0);
    }

    #[test]
    fn test_constant_node_is_not_split() {
        let frame = random_train_frame(20, 1, 0, 5).unwrap();
        let row = (0..20u32)
            .find(|&r| Some(frame.rank_at(0, r as usize)) != frame.missing_rank(0))
            .unwrap();
        let obs = vec![SampledObs { row, count: 3 }];
        let node = FrontierNode { pt_id: 0, depth: 0, pre_info: 0.0, obs: &obs };
        assert!(MedianSplitter.split(&frame, &[node]).is_empty());
    }
}

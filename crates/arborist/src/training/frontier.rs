//! Level-wise growth of one pre-tree.

use std::collections::HashMap;

use super::config::TrainConfig;
use super::sampling::{BagSample, SampledObs};
use super::split::{FrontierNode, SplitFrontier};
use crate::data::TrainFrame;
use crate::tree::{PreTree, PreTreeError, PtId};

/// Contiguous slice of the partitioned bag held by one terminal.
#[derive(Debug, Clone, Copy)]
struct Cell {
    pt_id: PtId,
    start: usize,
    end: usize,
    depth: usize,
    pre_info: f64,
}

/// Grows pre-trees by offering each level's terminals to a [`SplitFrontier`].
///
/// Observations are kept partitioned by terminal, so every node sees a
/// contiguous slice of the bag.
pub struct Frontier<'a> {
    frame: &'a TrainFrame,
    config: &'a TrainConfig,
}

impl<'a> Frontier<'a> {
    pub fn new(frame: &'a TrainFrame, config: &'a TrainConfig) -> Self {
        Self { frame, config }
    }

    fn splittable(&self, cell: &Cell, obs: &[SampledObs]) -> bool {
        let levels_left = self.config.tot_levels == 0 || cell.depth < self.config.tot_levels;
        let count: usize = obs[cell.start..cell.end].iter().map(|o| o.count as usize).sum();
        levels_left && count >= self.config.min_node
    }

    /// Splits `tree` until no offered node is split. Returns the terminal of
    /// every bagged sample, indexed like `bag.samples()`.
    ///
    /// # Errors
    ///
    /// Any split the pre-tree rejects, or one for a node that was not offered.
    pub fn grow<F: SplitFrontier + ?Sized>(
        &self,
        tree: &mut PreTree,
        bag: &BagSample,
        splitter: &F,
    ) -> Result<Vec<PtId>, PreTreeError> {
        let mut obs = bag.samples().to_vec();
        let mut idx: Vec<u32> = (0..obs.len() as u32).collect();
        let mut done = Vec::new();
        let mut level = vec![Cell {
            pt_id: 0,
            start: 0,
            end: obs.len(),
            depth: 0,
            pre_info: 0.0,
        }];

        while !level.is_empty() {
            let (offered, closed): (Vec<Cell>, Vec<Cell>) =
                level.into_iter().partition(|cell| self.splittable(cell, &obs));
            done.extend(closed);
            if offered.is_empty() {
                break;
            }

            let nuxes = {
                let nodes: Vec<FrontierNode<'_>> = offered
                    .iter()
                    .map(|cell| FrontierNode {
                        pt_id: cell.pt_id,
                        depth: cell.depth,
                        pre_info: cell.pre_info,
                        obs: &obs[cell.start..cell.end],
                    })
                    .collect();
                splitter.split(self.frame, &nodes)
            };

            let mut open: HashMap<PtId, Cell> = offered.iter().map(|c| (c.pt_id, *c)).collect();
            let mut next = Vec::new();
            for nux in nuxes {
                let cell = open
                    .remove(&nux.pt_id)
                    .ok_or(PreTreeError::NotOffered { pt_id: nux.pt_id })?;
                if nux.info < self.config.min_ratio * cell.pre_info {
                    done.push(cell);
                    continue;
                }
                let children = tree.add_criterion(&nux, self.frame)?;
                let bounds = self.partition(tree, &cell, children.start, &mut obs, &mut idx);
                for (j, pt_id) in children.enumerate() {
                    next.push(Cell {
                        pt_id,
                        start: bounds[j],
                        end: bounds[j + 1],
                        depth: cell.depth + 1,
                        pre_info: nux.info,
                    });
                }
            }
            done.extend(open.into_values());
            level = next;
        }

        let mut sample_map = vec![0; obs.len()];
        for cell in &done {
            for &sample in &idx[cell.start..cell.end] {
                sample_map[sample as usize] = cell.pt_id;
            }
        }
        Ok(sample_map)
    }

    /// Stable counting sort of the cell's slice into the split's true and
    /// false terminals. Returns the three child boundaries.
    fn partition(
        &self,
        tree: &PreTree,
        cell: &Cell,
        first_child: PtId,
        obs: &mut [SampledObs],
        idx: &mut [u32],
    ) -> Vec<usize> {
        let n_child = tree.node(cell.pt_id).children(cell.pt_id).len();
        let range = cell.start..cell.end;
        let slot: Vec<usize> = obs[range.clone()]
            .iter()
            .map(|o| {
                tree.route(cell.pt_id, self.frame, o.row as usize)
                    .map_or(0, |child| (child - first_child) as usize)
            })
            .collect();

        let mut bounds = vec![0; n_child + 1];
        for &s in &slot {
            bounds[s + 1] += 1;
        }
        for j in 0..n_child {
            bounds[j + 1] += bounds[j];
        }
        let mut fill = bounds.clone();
        let old_obs = obs[range.clone()].to_vec();
        let old_idx = idx[range.clone()].to_vec();
        for (k, &s) in slot.iter().enumerate() {
            obs[cell.start + fill[s]] = old_obs[k];
            idx[cell.start + fill[s]] = old_idx[k];
            fill[s] += 1;
        }
        bounds.iter().map(|b| cell.start + b).collect()
    }
}

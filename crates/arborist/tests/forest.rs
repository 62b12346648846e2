//! Consuming pre-trees into the crescent forest and archiving it.

use proptest::collection::vec as prop_vec;
use proptest::prelude::*;

use arborist::data::ObservationFrameBuilder;
use arborist::forest::{ForestCresc, TreeNode};
use arborist::io::native::{DeserializeError, NativeCodec};
use arborist::io::ForestArchive;
use arborist::training::{NuxCrit, SplitNux};
use arborist::tree::{PreTree, PtId, SplitBits, SplitVal};
use arborist::{Parallelism, TrainFrame};

const N_ROW: usize = 24;

/// Numeric `x = row`, numeric `y = row % 3` and factor `f = row % 6`.
fn frame() -> TrainFrame {
    let x: Vec<f64> = (0..N_ROW).map(|r| r as f64).collect();
    let y: Vec<f64> = (0..N_ROW).map(|r| (r % 3) as f64 * 10.0).collect();
    let f: Vec<u32> = (0..N_ROW as u32).map(|r| r % 6).collect();
    let frame = ObservationFrameBuilder::new(N_ROW)
        .numeric_column(&x)
        .numeric_column(&y)
        .factor_column(&f, 6)
        .build(Parallelism::Sequential)
        .unwrap();
    TrainFrame::new(frame, 0.25, Parallelism::Sequential).unwrap()
}

fn pretree_leaf(tree: &PreTree, frame: &TrainFrame, row: usize) -> u32 {
    let mut pt = 0;
    while let Some(child) = tree.branch(pt, frame, row) {
        pt = child;
    }
    tree.leaf_indices()[pt as usize].unwrap()
}

/// Walks a consumed tree with cuts still in rank units.
fn forest_leaf(nodes: &[TreeNode], bits: &SplitBits, frame: &TrainFrame, row: usize) -> u32 {
    let mut idx = 0;
    loop {
        let node = nodes[idx];
        let crit = match node {
            TreeNode::Leaf { leaf_idx } => return leaf_idx,
            TreeNode::Split { crit, .. } => crit,
        };
        let pred = crit.pred_idx as usize;
        let rank = frame.rank_at(pred, row);
        let holds = match crit.val {
            SplitVal::NumericCut(cut) => f64::from(rank) <= cut,
            SplitVal::FactorBits(offset) => {
                rank < frame.cardinality(pred).unwrap() && bits.test_bit(offset + rank as usize)
            }
        };
        idx += node.next(holds).unwrap();
    }
}

/// Walks a consumed tree after cuts were mapped back to predictor units.
fn forest_leaf_by_value(
    nodes: &[TreeNode],
    bits: &SplitBits,
    values: &[[f64; 2]],
    codes: &[u32],
    row: usize,
) -> u32 {
    let mut idx = 0;
    loop {
        let node = nodes[idx];
        let crit = match node {
            TreeNode::Leaf { leaf_idx } => return leaf_idx,
            TreeNode::Split { crit, .. } => crit,
        };
        let holds = match crit.val {
            SplitVal::NumericCut(cut) => values[row][crit.pred_idx as usize] <= cut,
            SplitVal::FactorBits(offset) => bits.test_bit(offset + codes[row] as usize),
        };
        idx += node.next(holds).unwrap();
    }
}

/// A tree mixing binary and compound splits on all three predictors.
fn mixed_tree(frame: &TrainFrame) -> PreTree {
    let mut tree = PreTree::new(0, 16);
    let root = tree
        .add_criterion(
            &SplitNux::compound(
                0,
                3.0,
                vec![
                    NuxCrit::cut(0, 5.5),
                    NuxCrit::bits(2, vec![1, 4]),
                    NuxCrit::cut(1, 0.5),
                ],
            ),
            frame,
        )
        .unwrap();
    let [id_true, id_false]: [PtId; 2] = [root.start, root.start + 1];
    tree.add_criterion(&SplitNux::cut(id_true, 0, 2.5, 1.0), frame).unwrap();
    let fac = tree
        .add_criterion(&SplitNux::bits(id_false, 2, vec![0, 3], 1.5), frame)
        .unwrap();
    tree.add_criterion(&SplitNux::cut(fac.end - 1, 0, 15.5, 2.0), frame).unwrap();
    tree
}

#[test]
fn test_consumed_tree_routes_like_pretree() {
    let frame = frame();
    let tree = mixed_tree(&frame);
    assert_eq!(tree.leaf_count(), 5);
    assert_eq!(tree.height(), 5 + 2 + 2 + 2);

    let mut forest = ForestCresc::new(1);
    let mut pred_info = vec![0.0; 3];
    tree.consume(&mut forest, 0, &mut pred_info).unwrap();

    assert_eq!(forest.height(), &[tree.height()]);
    assert_eq!(pred_info, vec![3.0 + 1.0 + 2.0, 0.0, 1.5]);

    // Every criterion of the root exits to its true terminal.
    let nodes = forest.node_block().tree(0);
    for (pt, node) in nodes.iter().enumerate().take(3) {
        assert_eq!(pt + node.next(true).unwrap(), 3);
    }
    assert_eq!(nodes[0].next(false), Some(1));
    assert_eq!(1 + nodes[1].next(false).unwrap(), 2);
    assert_eq!(2 + nodes[2].next(false).unwrap(), 4);

    let bits = forest.fac_block().tree(0);
    for row in 0..N_ROW {
        let expected = pretree_leaf(&tree, &frame, row);
        assert_eq!(forest_leaf(nodes, &bits, &frame, row), expected, "row {row}");
    }
    let n_leaf = nodes.iter().filter(|n| n.is_leaf()).count();
    assert_eq!(n_leaf, tree.leaf_count());
}

#[test]
fn test_cut_below_missing_rank_stays_finite() {
    let frame = ObservationFrameBuilder::new(5)
        .numeric_column(&[3.1, 1.0, 1.0, 7.2, f64::NAN])
        .build(Parallelism::Sequential)
        .unwrap();
    let frame = TrainFrame::new(frame, 0.25, Parallelism::Sequential).unwrap();
    let mut tree = PreTree::new(0, 4);
    tree.add_criterion(&SplitNux::cut(0, 0, 2.5, 1.0), &frame).unwrap();
    let expected: Vec<u32> = (0..5).map(|row| pretree_leaf(&tree, &frame, row)).collect();
    assert_eq!(expected, vec![0, 0, 0, 0, 1]);

    let mut forest = ForestCresc::new(1);
    tree.consume(&mut forest, 0, &mut [0.0]).unwrap();
    forest.split_update(&frame);
    let nodes = forest.node_block().tree(0);
    match nodes[0] {
        TreeNode::Split { crit, .. } => assert_eq!(crit.val, SplitVal::NumericCut(7.2)),
        TreeNode::Leaf { .. } => panic!("root should split"),
    }

    let values = [[3.1, 0.0], [1.0, 0.0], [1.0, 0.0], [7.2, 0.0], [f64::NAN, 0.0]];
    let bits = SplitBits::new();
    for (row, &leaf) in expected.iter().enumerate() {
        assert_eq!(forest_leaf_by_value(nodes, &bits, &values, &[0; 5], row), leaf);
    }
}

#[test]
fn test_split_update_interpolates_cuts() {
    let frame = frame();
    let tree = mixed_tree(&frame);
    let mut forest = ForestCresc::new(1);
    let mut pred_info = vec![0.0; 3];
    tree.consume(&mut forest, 0, &mut pred_info).unwrap();
    forest.split_update(&frame);

    let cuts: Vec<(u32, f64)> = forest
        .node_block()
        .nodes()
        .iter()
        .filter_map(|node| match node {
            TreeNode::Split { crit, .. } => match crit.val {
                SplitVal::NumericCut(cut) => Some((crit.pred_idx, cut)),
                SplitVal::FactorBits(_) => None,
            },
            TreeNode::Leaf { .. } => None,
        })
        .collect();
    assert!(cuts.contains(&(0, 5.5)));
    assert!(cuts.contains(&(1, 5.0)));

    let mut values = [[0.0; 2]; N_ROW];
    for (row, v) in values.iter_mut().enumerate() {
        *v = [row as f64, (row % 3) as f64 * 10.0];
    }
    let codes: Vec<u32> = (0..N_ROW as u32).map(|r| r % 6).collect();
    let nodes = forest.node_block().tree(0);
    let bits = forest.fac_block().tree(0);
    for row in 0..N_ROW {
        assert_eq!(
            forest_leaf_by_value(nodes, &bits, &values, &codes, row),
            pretree_leaf(&tree, &frame, row)
        );
    }
}

proptest! {
    #[test]
    fn heights_accumulate_over_trees(shape in prop_vec(0usize..4, 1..8)) {
        let frame = frame();
        let mut forest = ForestCresc::new(shape.len());
        let mut pred_info = vec![0.0; 3];

        for (t_idx, &depth) in shape.iter().enumerate() {
            let mut tree = PreTree::new(0, 8);
            let mut pt = 0;
            for level in 0..depth {
                let nux = if level % 2 == 0 {
                    SplitNux::cut(pt, 0, 4.5 + level as f64, 1.0)
                } else {
                    SplitNux::bits(pt, 2, vec![level as u32], 1.0)
                };
                pt = tree.add_criterion(&nux, &frame).unwrap().start;
            }
            tree.consume(&mut forest, t_idx, &mut pred_info).unwrap();
        }

        let height = forest.height();
        prop_assert_eq!(height.len(), shape.len());
        let mut prev = 0;
        for (t_idx, &depth) in shape.iter().enumerate() {
            prop_assert_eq!(height[t_idx] - prev, 1 + 2 * depth);
            prev = height[t_idx];
        }
        for pair in forest.fac_height().windows(2) {
            prop_assert!(pair[0] <= pair[1]);
        }
        let raw = forest.dump();
        prop_assert!(raw.validate().is_ok());
        prop_assert_eq!(raw.n_tree(), shape.len());
    }
}

#[test]
fn test_trees_must_arrive_in_order() {
    let frame = frame();
    let tree = mixed_tree(&frame);
    let mut forest = ForestCresc::new(2);
    let mut pred_info = vec![0.0; 3];
    assert!(tree.consume(&mut forest, 1, &mut pred_info).is_err());
    tree.consume(&mut forest, 0, &mut pred_info).unwrap();
    tree.consume(&mut forest, 1, &mut pred_info).unwrap();
    assert!(tree.consume(&mut forest, 2, &mut pred_info).is_err());
}

// =============================================================================
// Archive
// =============================================================================

fn archive() -> ForestArchive {
    let frame = frame();
    let tree = mixed_tree(&frame);
    let mut forest = ForestCresc::new(2);
    let mut pred_info = vec![0.0; 3];
    tree.consume(&mut forest, 0, &mut pred_info).unwrap();
    PreTree::new(0, 1).consume(&mut forest, 1, &mut pred_info).unwrap();
    forest.split_update(&frame);
    ForestArchive::new(&frame, forest.dump(), pred_info)
}

#[test]
fn test_archive_preserves_forest() {
    let archive = archive();
    let codec = NativeCodec::new();
    let bytes = codec.serialize(&archive).unwrap();
    let (header, decoded) = codec.deserialize(&bytes).unwrap();

    assert_eq!(header.n_tree, 2);
    assert_eq!(header.n_pred, 3);
    assert_eq!(decoded, archive);

    let fac_first = decoded.metadata.fac_first();
    let nodes = decoded.forest.unpack_nodes(fac_first).unwrap();
    assert!(nodes.iter().any(|n| matches!(n, TreeNode::Split { crit, .. } if crit.is_factor())));
    assert_eq!(nodes.last(), Some(&TreeNode::Leaf { leaf_idx: 0 }));
}

#[test]
fn test_archive_detects_damage() {
    let codec = NativeCodec::new();
    let bytes = codec.serialize(&archive()).unwrap();

    let mut flipped = bytes.clone();
    let last = flipped.len() - 1;
    flipped[last] ^= 0x40;
    assert!(matches!(codec.deserialize(&flipped), Err(DeserializeError::ChecksumMismatch { .. })));

    let short = &bytes[..bytes.len() - 3];
    assert!(matches!(codec.deserialize(short), Err(DeserializeError::Truncated { .. })));

    let mut foreign = bytes.clone();
    foreign[..4].copy_from_slice(b"GBDT");
    assert!(matches!(codec.deserialize(&foreign), Err(DeserializeError::NotAnArchive)));
}

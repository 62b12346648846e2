//! End-to-end training: frame, frontier, leaf merging, forest and archive.

use rstest::rstest;
use tracing_subscriber::EnvFilter;

use arborist::data::ObservationFrameBuilder;
use arborist::forest::TreeNode;
use arborist::io::native::NativeCodec;
use arborist::testing::data::{random_codes, random_levels};
use arborist::testing::{MedianSplitter, NoSplit};
use arborist::training::{LeafMap, TrainError, Verbosity};
use arborist::tree::{SplitBits, SplitVal};
use arborist::{ForestTrainer, Parallelism, TrainConfig, TrainFrame};

const N_ROW: usize = 120;

struct Data {
    numeric: Vec<Vec<f64>>,
    codes: Vec<Vec<u32>>,
}

impl Data {
    fn new(seed: u64) -> Self {
        let numeric = vec![
            random_levels(N_ROW, 20, 0.05, seed),
            random_levels(N_ROW, 4, 0.0, seed + 1),
        ];
        let codes = vec![random_codes(N_ROW, 5, seed + 2)];
        Self { numeric, codes }
    }

    fn frame(&self, trainer: &ForestTrainer<MedianSplitter>) -> TrainFrame {
        let builder = ObservationFrameBuilder::new(N_ROW)
            .numeric_column(&self.numeric[0])
            .numeric_column(&self.numeric[1])
            .factor_column(&self.codes[0], 5);
        trainer.prepare(builder.build(Parallelism::Sequential).unwrap()).unwrap()
    }

    fn value(&self, pred: usize, row: usize) -> f64 {
        self.numeric[pred][row]
    }
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Leaf reached by `row` in a tree whose cuts are in predictor units.
fn walk(nodes: &[TreeNode], bits: &SplitBits, data: &Data, n_num: usize, row: usize) -> u32 {
    let mut idx = 0;
    loop {
        let node = nodes[idx];
        let crit = match node {
            TreeNode::Leaf { leaf_idx } => return leaf_idx,
            TreeNode::Split { crit, .. } => crit,
        };
        let pred = crit.pred_idx as usize;
        let holds = match crit.val {
            SplitVal::NumericCut(cut) => data.value(pred, row) <= cut,
            SplitVal::FactorBits(offset) => {
                let code = data.codes[pred - n_num][row];
                bits.test_bit(offset + code as usize)
            }
        };
        idx += node.next(holds).unwrap();
    }
}

fn assert_in_bag_rows_reach_their_leaves(
    trainer_leaves: &[LeafMap],
    forest: &arborist::ForestCresc,
    data: &Data,
) {
    for (t_idx, map) in trainer_leaves.iter().enumerate() {
        let nodes = forest.node_block().tree(t_idx);
        let bits = forest.fac_block().tree(t_idx);
        for row in map.bag.bagged_rows() {
            let row = row as usize;
            assert_eq!(
                Some(walk(nodes, &bits, data, 2, row)),
                map.leaf_of_row(row),
                "tree {t_idx}, row {row}"
            );
        }
    }
}

// =============================================================================
// End to end
// =============================================================================

#[rstest]
#[case::bootstrap(true, 0, 1)]
#[case::bootstrap_merged(true, 6, 2)]
#[case::subsample_merged(false, 4, 0)]
fn test_forest_routes_in_bag_rows(
    #[case] with_replacement: bool,
    #[case] leaf_max: usize,
    #[case] n_threads: usize,
) {
    init_logging();
    let data = Data::new(17);
    let config = TrainConfig::builder()
        .n_tree(9)
        .tree_block(4)
        .with_replacement(with_replacement)
        .maybe_n_samp((!with_replacement).then_some(N_ROW / 2))
        .leaf_max(leaf_max)
        .n_threads(n_threads)
        .verbosity(Verbosity::Debug)
        .build()
        .unwrap();
    let trainer = ForestTrainer::new(config, MedianSplitter);
    let frame = data.frame(&trainer);
    let trained = trainer.train(&frame).unwrap();

    assert_eq!(trained.leaves.len(), 9);
    assert_eq!(trained.forest.tree_count(), 9);
    assert_in_bag_rows_reach_their_leaves(&trained.leaves, &trained.forest, &data);

    for (t_idx, map) in trained.leaves.iter().enumerate() {
        let n_leaf = trained
            .forest
            .node_block()
            .tree(t_idx)
            .iter()
            .filter(|n| n.is_leaf())
            .count();
        if leaf_max > 0 {
            assert!(n_leaf <= leaf_max);
        }
        assert!(map.leaves.iter().all(|&l| (l as usize) < n_leaf));
        if !with_replacement {
            assert_eq!(map.bag.bag_count(), N_ROW / 2);
        }
    }
}

#[test]
fn test_same_seed_same_forest() {
    let data = Data::new(3);
    let train = |seed| {
        let config = TrainConfig::builder()
            .n_tree(6)
            .tree_block(4)
            .leaf_max(5)
            .seed(seed)
            .n_threads(2)
            .build()
            .unwrap();
        let trainer = ForestTrainer::new(config, MedianSplitter);
        let frame = data.frame(&trainer);
        trainer.train(&frame).unwrap().forest.dump()
    };
    assert_eq!(train(11), train(11));
    assert_ne!(train(11), train(12));
}

#[test]
fn test_archive_of_trained_forest() {
    let data = Data::new(29);
    let config = TrainConfig::builder().n_tree(3).leaf_max(8).n_threads(1).build().unwrap();
    let trainer = ForestTrainer::new(config, MedianSplitter);
    let frame = data.frame(&trainer);
    let trained = trainer.train(&frame).unwrap();

    let archive = trained.archive(&frame);
    assert_eq!(archive.metadata.n_row, N_ROW as u64);
    assert_eq!(archive.metadata.cardinality, vec![5]);
    assert_eq!(archive.pred_info, trained.pred_info);

    let codec = NativeCodec::new();
    let (header, decoded) = codec.deserialize(&codec.serialize(&archive).unwrap()).unwrap();
    assert_eq!(header.n_tree, 3);
    assert_eq!(decoded, archive);

    let total: f64 = trained.pred_info.iter().sum();
    assert!(total > 0.0);
}

#[test]
fn test_stumps_when_nothing_splits() {
    let frame = ObservationFrameBuilder::new(10)
        .numeric_column(&[1.0; 10])
        .build(Parallelism::Sequential)
        .unwrap();
    let config = TrainConfig::builder().n_tree(3).n_threads(1).build().unwrap();
    let trainer = ForestTrainer::new(config, NoSplit);
    let frame = trainer.prepare(frame).unwrap();
    let trained = trainer.train(&frame).unwrap();

    assert_eq!(trained.forest.height(), &[1, 2, 3]);
    assert_eq!(trained.forest.fac_height(), &[0, 0, 0]);
}

#[test]
fn test_bad_compression_threshold_rejected() {
    let mut config = TrainConfig::default();
    config.auto_compress = 2.0;
    let trainer = ForestTrainer::new(config, NoSplit);
    let frame = ObservationFrameBuilder::new(2)
        .numeric_column(&[0.0, 1.0])
        .build(Parallelism::Sequential)
        .unwrap();
    assert!(matches!(trainer.prepare(frame), Err(TrainError::Frame(_))));
}

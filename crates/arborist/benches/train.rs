//! Frame encoding and forest construction benchmarks.
//!
//! Run with: `cargo bench --bench train`

use std::time::Duration;

use ndarray::Array2;
use rand::prelude::*;

use arborist::testing::MedianSplitter;
use arborist::{ForestTrainer, ObservationFrame, ObservationFrameBuilder, Parallelism, TrainConfig};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const N_NUM: usize = 16;
const N_FAC: usize = 4;
const CARDINALITY: u32 = 12;

fn default_criterion() -> Criterion {
    Criterion::default()
        .configure_from_args()
        .warm_up_time(Duration::from_secs(2))
        .measurement_time(Duration::from_secs(10))
        .sample_size(10)
}

/// Numeric columns alternate between many distinct values and mostly zero.
fn synthetic_blocks(n_row: usize, seed: u64) -> (Array2<f64>, Array2<u32>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let numeric = Array2::from_shape_fn((n_row, N_NUM), |(_, col)| {
        if col % 2 == 1 && rng.gen::<f64>() < 0.8 {
            0.0
        } else {
            (rng.gen::<f64>() * 100.0).round() / 10.0
        }
    });
    let codes = Array2::from_shape_fn((n_row, N_FAC), |_| rng.gen_range(0..CARDINALITY));
    (numeric, codes)
}

fn build_frame(numeric: &Array2<f64>, codes: &Array2<u32>, parallelism: Parallelism) -> ObservationFrame {
    ObservationFrameBuilder::new(numeric.nrows())
        .numeric_block(numeric.view())
        .factor_block(codes.view(), &[CARDINALITY; N_FAC])
        .build(parallelism)
        .unwrap()
}

// =============================================================================
// Encoding
// =============================================================================

fn bench_frame_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame/encode");

    for n_row in [1_000usize, 10_000, 100_000] {
        let (numeric, codes) = synthetic_blocks(n_row, 42);
        group.throughput(Throughput::Elements((n_row * (N_NUM + N_FAC)) as u64));

        for (name, parallelism) in [("sequential", Parallelism::Sequential), ("parallel", Parallelism::Parallel)] {
            group.bench_with_input(BenchmarkId::new(name, n_row), &n_row, |b, _| {
                b.iter(|| black_box(build_frame(black_box(&numeric), black_box(&codes), parallelism)))
            });
        }
    }

    group.finish();
}

// =============================================================================
// Training
// =============================================================================

fn bench_forest_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("forest/train");

    for n_row in [1_000usize, 10_000] {
        let (numeric, codes) = synthetic_blocks(n_row, 7);
        group.throughput(Throughput::Elements(n_row as u64));

        for leaf_max in [0usize, 32] {
            let config = TrainConfig::builder()
                .n_tree(50)
                .leaf_max(leaf_max)
                .min_node(5)
                .build()
                .unwrap();
            let trainer = ForestTrainer::new(config, MedianSplitter);
            let frame = trainer
                .prepare(build_frame(&numeric, &codes, Parallelism::Parallel))
                .unwrap();

            let id = BenchmarkId::new(format!("leaf_max_{leaf_max}"), n_row);
            group.bench_with_input(id, &frame, |b, frame| {
                b.iter(|| black_box(trainer.train(black_box(frame)).unwrap()))
            });
        }
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = default_criterion();
    targets = bench_frame_encoding, bench_forest_training
}
criterion_main!(benches);

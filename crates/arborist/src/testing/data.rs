use rand::prelude::*;

use crate::data::{FrameError, ObservationFrameBuilder, TrainFrame};
use crate::utils::Parallelism;

/// Numeric column over `n_level` distinct values (multiples of 0.5), with
/// roughly `nan_rate` of the rows missing.
pub fn random_levels(n_row: usize, n_level: u32, nan_rate: f64, seed: u64) -> Vec<f64> {
    assert!(n_level > 0);
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n_row)
        .map(|_| {
            if rng.gen::<f64>() < nan_rate {
                f64::NAN
            } else {
                f64::from(rng.gen_range(0..n_level)) * 0.5
            }
        })
        .collect()
}

/// Uniform factor codes in `0..cardinality`.
pub fn random_codes(n_row: usize, cardinality: u32, seed: u64) -> Vec<u32> {
    assert!(cardinality > 0);
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n_row).map(|_| rng.gen_range(0..cardinality)).collect()
}

/// Mixed frame of `n_num` numeric and `n_fac` factor predictors.
///
/// Odd numeric predictors are mostly one value, so they are laid out densely.
pub fn random_train_frame(
    n_row: usize,
    n_num: usize,
    n_fac: usize,
    seed: u64,
) -> Result<TrainFrame, FrameError> {
    let mut builder = ObservationFrameBuilder::new(n_row);
    for pred in 0..n_num {
        let seed = seed.wrapping_add(pred as u64);
        let column = if pred % 2 == 0 {
            random_levels(n_row, 12, 0.05, seed)
        } else {
            random_levels(n_row, 3, 0.0, seed)
                .into_iter()
                .enumerate()
                .map(|(row, v)| if row % 5 == 0 { v } else { 0.0 })
                .collect()
        };
        builder = builder.numeric_column(&column);
    }
    for pred in 0..n_fac {
        let cardinality = 3 + pred as u32;
        let codes = random_codes(n_row, cardinality, seed.wrapping_add(1000 + pred as u64));
        builder = builder.factor_column(&codes, cardinality);
    }
    let frame = builder.build(Parallelism::Sequential)?;
    TrainFrame::new(frame, 0.25, Parallelism::Sequential)
}

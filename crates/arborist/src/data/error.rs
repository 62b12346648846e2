//! Frame construction errors.

use thiserror::Error;

/// Configuration errors detected while building an observation frame.
///
/// All of these are fatal: training never starts on an inconsistent frame.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    /// A column's length disagrees with the frame's row count.
    #[error("predictor {predictor}: expected {expected} rows, got {actual}")]
    RowCountMismatch {
        predictor: usize,
        expected: usize,
        actual: usize,
    },

    /// Run extents do not sum to the row count.
    #[error("predictor {predictor}: runs cover {covered} rows, frame has {n_row}")]
    RunCoverage {
        predictor: usize,
        covered: usize,
        n_row: usize,
    },

    /// Two runs claim the same row, or a run extends past the last row.
    #[error("predictor {predictor}: run covering row {row} overlaps another run or the frame end")]
    RunOverlap { predictor: usize, row: usize },

    /// A run of zero length.
    #[error("predictor {predictor}: empty run at row {row}")]
    EmptyRun { predictor: usize, row: usize },

    /// Row, column and pointer arrays were all supplied.
    #[error("indeterminate sparse matrix format: row, column and pointer indices all supplied")]
    AmbiguousSparse,

    /// Fewer than two index arrays were supplied.
    #[error("incomplete sparse matrix format: need two of row, column and pointer indices")]
    IncompleteSparse,

    /// Indices without values.
    #[error("pattern matrices are not supported")]
    PatternMatrix,

    /// Sparse index arrays are inconsistent with the declared shape.
    #[error("malformed sparse matrix: {0}")]
    SparseShape(String),

    /// The frame was given no predictors.
    #[error("frame has no predictors")]
    NoPredictors,

    /// A factor predictor was declared with zero levels.
    #[error("predictor {predictor}: factor cardinality must be positive")]
    ZeroCardinality { predictor: usize },

    /// A factor block and its cardinality list disagree in width.
    #[error("factor block has {expected} columns but {actual} cardinalities")]
    CardinalityCount { expected: usize, actual: usize },

    /// Permutation is not a bijection on the row space.
    #[error("invalid row permutation: {0}")]
    InvalidPermutation(String),

    /// Rows are addressed by `u32` once sampled for training.
    #[error("frame has {n_row} rows, at most {max} are supported")]
    TooManyRows { n_row: usize, max: usize },

    /// Auto-compression threshold outside `[0, 1]`.
    #[error("auto_compress must lie in [0, 1], got {0}")]
    InvalidAutoCompress(f64),
}

//! Observation frame: run-length encodings for every predictor.
//!
//! Numeric predictors occupy indices `0..n_pred_num`, factor predictors
//! follow. The builder accepts columns in any order and in several input
//! forms (dense slices, `ndarray` blocks, pre-encoded triples, sparse
//! matrices); encoding runs once per predictor, optionally in parallel.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use super::error::FrameError;
use super::rle::{scatter_ranks, ColumnValues, Rank, RleRun, RunLengthEncoder, ValueRun};
use super::sparse::SparseMatrix;
use crate::utils::Parallelism;

/// Largest frame the builder accepts; sampled rows are stored as `u32`.
pub const MAX_ROWS: usize = u32::MAX as usize;

/// Whether a predictor is numeric or categorical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictorKind {
    Numeric,
    Factor,
}

// =============================================================================
// ObservationFrame
// =============================================================================

/// Per-predictor run lists for an entire training matrix.
///
/// Invariant: for every predictor, runs are disjoint and their extents sum to
/// `n_row`. Runs are ordered by `(rank, row)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationFrame {
    n_row: usize,
    n_pred_num: usize,
    runs: Vec<Vec<RleRun>>,
    /// Distinct values per numeric predictor, indexed by rank.
    num_values: Vec<Vec<f64>>,
    /// Level counts per factor predictor.
    cardinality: Vec<u32>,
}

impl ObservationFrame {
    #[inline]
    pub fn n_row(&self) -> usize {
        self.n_row
    }

    #[inline]
    pub fn n_pred(&self) -> usize {
        self.runs.len()
    }

    #[inline]
    pub fn n_pred_num(&self) -> usize {
        self.n_pred_num
    }

    #[inline]
    pub fn n_pred_fac(&self) -> usize {
        self.cardinality.len()
    }

    /// Index of the first factor predictor.
    #[inline]
    pub fn fac_first(&self) -> usize {
        self.n_pred_num
    }

    #[inline]
    pub fn kind(&self, pred: usize) -> PredictorKind {
        if pred < self.n_pred_num {
            PredictorKind::Numeric
        } else {
            PredictorKind::Factor
        }
    }

    #[inline]
    pub fn is_factor(&self, pred: usize) -> bool {
        pred >= self.n_pred_num
    }

    /// Runs of `pred`, ordered by `(rank, row)`.
    #[inline]
    pub fn runs(&self, pred: usize) -> &[RleRun] {
        &self.runs[pred]
    }

    /// Level count of a factor predictor, `None` for numeric ones.
    #[inline]
    pub fn cardinality(&self, pred: usize) -> Option<u32> {
        pred.checked_sub(self.n_pred_num)
            .and_then(|fac| self.cardinality.get(fac).copied())
    }

    /// All factor cardinalities, in predictor order.
    #[inline]
    pub fn cardinalities(&self) -> &[u32] {
        &self.cardinality
    }

    /// Rank-ordered distinct values of a numeric predictor.
    #[inline]
    pub fn num_values(&self, pred: usize) -> Option<&[f64]> {
        self.num_values.get(pred).map(Vec::as_slice)
    }

    /// Number of rank slots of `pred`, sentinel included.
    pub fn rank_count(&self, pred: usize) -> usize {
        match self.cardinality(pred) {
            Some(card) => {
                let sentinel = self.runs[pred].iter().any(|r| r.rank >= card);
                card as usize + usize::from(sentinel)
            }
            None => self.num_values[pred].len(),
        }
    }

    /// One rank per row.
    pub fn row_ranks(&self, pred: usize) -> Vec<Rank> {
        scatter_ranks(&self.runs[pred], self.n_row)
    }

    /// Runs of `pred` under a new row order: new row `k` takes the rank of
    /// old row `perm[k]`.
    ///
    /// # Errors
    ///
    /// [`FrameError::InvalidPermutation`] if `perm` is not a permutation of
    /// `0..n_row`.
    pub fn permute(&self, pred: usize, perm: &[usize]) -> Result<Vec<RleRun>, FrameError> {
        check_permutation(perm, self.n_row)?;
        Ok(self.permute_unchecked(pred, perm))
    }

    fn permute_unchecked(&self, pred: usize, perm: &[usize]) -> Vec<RleRun> {
        let ranks = self.row_ranks(pred);
        let mut runs: Vec<RleRun> = Vec::new();
        for (row, &old) in perm.iter().enumerate() {
            let rank = ranks[old];
            match runs.last_mut() {
                Some(last) if last.rank == rank => last.extent += 1,
                _ => runs.push(RleRun::new(rank, row, 1)),
            }
        }
        runs.sort_by_key(|r| (r.rank, r.row));
        runs
    }

    /// A copy of the frame with every predictor permuted to a new row order.
    ///
    /// # Errors
    ///
    /// [`FrameError::InvalidPermutation`] if `perm` is not a permutation of
    /// `0..n_row`.
    pub fn reorder(&self, perm: &[usize], parallelism: Parallelism) -> Result<Self, FrameError> {
        check_permutation(perm, self.n_row)?;
        let runs = parallelism.maybe_par_map(0..self.n_pred(), |pred| self.permute_unchecked(pred, perm));
        Ok(Self {
            n_row: self.n_row,
            n_pred_num: self.n_pred_num,
            runs,
            num_values: self.num_values.clone(),
            cardinality: self.cardinality.clone(),
        })
    }
}

fn check_permutation(perm: &[usize], n_row: usize) -> Result<(), FrameError> {
    if perm.len() != n_row {
        return Err(FrameError::InvalidPermutation(format!(
            "length {} for {} rows",
            perm.len(),
            n_row
        )));
    }
    let mut seen = vec![false; n_row];
    for &row in perm {
        match seen.get_mut(row) {
            Some(flag) if !*flag => *flag = true,
            Some(_) => {
                return Err(FrameError::InvalidPermutation(format!("row {} repeated", row)));
            }
            None => {
                return Err(FrameError::InvalidPermutation(format!("row {} out of bounds", row)));
            }
        }
    }
    Ok(())
}

// =============================================================================
// ObservationFrameBuilder
// =============================================================================

/// A column waiting to be encoded.
#[derive(Clone, Debug)]
enum PendingColumn {
    NumericDense(Vec<f64>),
    NumericRuns(Vec<ValueRun<f64>>),
    FactorDense { codes: Vec<u32>, cardinality: u32 },
    FactorRuns { runs: Vec<ValueRun<u32>>, cardinality: u32 },
}

/// Builder for [`ObservationFrame`].
///
/// Input errors are recorded as columns are added and reported by
/// [`build`](Self::build), so calls can be chained.
///
/// # Example
///
/// ```
/// use arborist::data::ObservationFrameBuilder;
/// use arborist::utils::Parallelism;
///
/// let frame = ObservationFrameBuilder::new(4)
///     .numeric_column(&[0.5, 1.5, 0.5, 2.0])
///     .factor_column(&[1, 0, 1, 2], 3)
///     .build(Parallelism::Sequential)
///     .unwrap();
///
/// assert_eq!(frame.n_pred(), 2);
/// assert_eq!(frame.cardinality(1), Some(3));
/// ```
#[derive(Clone, Debug)]
pub struct ObservationFrameBuilder {
    n_row: usize,
    numeric: Vec<PendingColumn>,
    factor: Vec<PendingColumn>,
    error: Option<FrameError>,
}

impl ObservationFrameBuilder {
    pub fn new(n_row: usize) -> Self {
        Self {
            n_row,
            numeric: Vec::new(),
            factor: Vec::new(),
            error: None,
        }
    }

    fn fail(&mut self, error: FrameError) {
        self.error.get_or_insert(error);
    }

    /// Add a dense numeric column.
    pub fn numeric_column(mut self, values: &[f64]) -> Self {
        self.numeric.push(PendingColumn::NumericDense(values.to_vec()));
        self
    }

    /// Add every column of a `(n_row, n_col)` numeric block.
    pub fn numeric_block(mut self, block: ArrayView2<'_, f64>) -> Self {
        for col in block.columns() {
            self.numeric.push(PendingColumn::NumericDense(col.to_vec()));
        }
        self
    }

    /// Add a numeric column given as `(value, row, extent)` triples.
    pub fn numeric_runs(mut self, runs: Vec<ValueRun<f64>>) -> Self {
        self.numeric.push(PendingColumn::NumericRuns(runs));
        self
    }

    /// Add every column of a sparse numeric block.
    pub fn numeric_sparse(mut self, matrix: &SparseMatrix) -> Self {
        if matrix.n_row != self.n_row {
            let predictor = self.numeric.len();
            self.fail(FrameError::RowCountMismatch {
                predictor,
                expected: self.n_row,
                actual: matrix.n_row,
            });
            return self;
        }
        match matrix.column_runs() {
            Ok(columns) => {
                self.numeric
                    .extend(columns.into_iter().map(PendingColumn::NumericRuns));
            }
            Err(e) => self.fail(e),
        }
        self
    }

    /// Add a dense factor column with `cardinality` levels.
    pub fn factor_column(mut self, codes: &[u32], cardinality: u32) -> Self {
        self.factor.push(PendingColumn::FactorDense {
            codes: codes.to_vec(),
            cardinality,
        });
        self
    }

    /// Add every column of a `(n_row, n_col)` factor block.
    pub fn factor_block(mut self, block: ArrayView2<'_, u32>, cardinalities: &[u32]) -> Self {
        if block.ncols() != cardinalities.len() {
            self.fail(FrameError::CardinalityCount {
                expected: block.ncols(),
                actual: cardinalities.len(),
            });
            return self;
        }
        for (col, &cardinality) in block.columns().into_iter().zip(cardinalities) {
            self.factor.push(PendingColumn::FactorDense {
                codes: col.to_vec(),
                cardinality,
            });
        }
        self
    }

    /// Add a factor column given as `(code, row, extent)` triples.
    pub fn factor_runs(mut self, runs: Vec<ValueRun<u32>>, cardinality: u32) -> Self {
        self.factor.push(PendingColumn::FactorRuns { runs, cardinality });
        self
    }

    /// Encode all columns.
    ///
    /// # Errors
    ///
    /// The first configuration error recorded while adding columns, or found
    /// while encoding them. Frames beyond `u32::MAX` rows are rejected.
    pub fn build(self, parallelism: Parallelism) -> Result<ObservationFrame, FrameError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let n_row = self.n_row;
        if n_row > MAX_ROWS {
            return Err(FrameError::TooManyRows { n_row, max: MAX_ROWS });
        }
        let n_pred_num = self.numeric.len();
        let pending: Vec<(usize, PendingColumn)> = self
            .numeric
            .into_iter()
            .chain(self.factor)
            .enumerate()
            .collect();
        if pending.is_empty() {
            return Err(FrameError::NoPredictors);
        }

        let encoded = parallelism
            .maybe_par_map(pending, |(pred, column)| encode(pred, column, n_row))
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        let mut runs = Vec::with_capacity(encoded.len());
        let mut num_values = Vec::with_capacity(n_pred_num);
        let mut cardinality = Vec::with_capacity(encoded.len() - n_pred_num);
        for column in encoded {
            let (col_runs, values) = column.into_parts();
            runs.push(col_runs);
            match values {
                ColumnValues::Numeric(v) => num_values.push(v),
                ColumnValues::Factor { cardinality: c } => cardinality.push(c),
            }
        }

        tracing::debug!(
            n_row,
            n_pred_num,
            n_pred_fac = cardinality.len(),
            "encoded observation frame"
        );

        Ok(ObservationFrame {
            n_row,
            n_pred_num,
            runs,
            num_values,
            cardinality,
        })
    }
}

fn encode(
    pred: usize,
    column: PendingColumn,
    n_row: usize,
) -> Result<super::rle::EncodedColumn, FrameError> {
    let mismatch = |actual: usize| FrameError::RowCountMismatch {
        predictor: pred,
        expected: n_row,
        actual,
    };
    match column {
        PendingColumn::NumericDense(values) => {
            if values.len() != n_row {
                return Err(mismatch(values.len()));
            }
            Ok(RunLengthEncoder::encode_numeric(values))
        }
        PendingColumn::NumericRuns(runs) => RunLengthEncoder::encode_numeric_runs(&runs, n_row, pred),
        PendingColumn::FactorDense { codes, cardinality } => {
            if codes.len() != n_row {
                return Err(mismatch(codes.len()));
            }
            if cardinality == 0 {
                return Err(FrameError::ZeroCardinality { predictor: pred });
            }
            Ok(RunLengthEncoder::encode_factor(codes, cardinality))
        }
        PendingColumn::FactorRuns { runs, cardinality } => {
            if cardinality == 0 {
                return Err(FrameError::ZeroCardinality { predictor: pred });
            }
            RunLengthEncoder::encode_factor_runs(&runs, n_row, cardinality, pred)
        }
    }
}

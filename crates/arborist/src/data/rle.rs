//! Run-length encoding of observation columns.
//!
//! A column of `n_row` values becomes a list of [`RleRun`]s: maximal ranges
//! of contiguous rows sharing one rank. Ranks are predictor-local:
//!
//! - **Numeric**: dense zero-based index of the distinct value in ascending
//!   order. NaN sorts last and takes the final rank.
//! - **Factor**: the category code itself. Codes at or beyond the declared
//!   cardinality collapse onto the sentinel rank `cardinality`.
//!
//! Dense columns and pre-encoded `(value, row, extent)` triples go through
//! the same sort-and-merge path, so both forms of one logical column encode
//! identically.

use std::cmp::Ordering;
use std::ops::Range;

use super::error::FrameError;

/// Predictor-local rank.
pub type Rank = u32;

// =============================================================================
// Runs
// =============================================================================

/// A maximal run of contiguous rows sharing one rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RleRun {
    /// Rank shared by every row of the run.
    pub rank: Rank,
    /// First row of the run.
    pub row: usize,
    /// Number of rows.
    pub extent: usize,
}

impl RleRun {
    #[inline]
    pub fn new(rank: Rank, row: usize, extent: usize) -> Self {
        Self { rank, row, extent }
    }

    /// One past the last row.
    #[inline]
    pub fn end(&self) -> usize {
        self.row + self.extent
    }

    #[inline]
    pub fn rows(&self) -> Range<usize> {
        self.row..self.end()
    }
}

/// A run of rows sharing one raw value, as delivered by sparse front ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRun<T> {
    pub value: T,
    pub row: usize,
    pub extent: usize,
}

impl<T> ValueRun<T> {
    #[inline]
    pub fn new(value: T, row: usize, extent: usize) -> Self {
        Self { value, row, extent }
    }
}

// =============================================================================
// EncodedColumn
// =============================================================================

/// Rank-to-value information retained for one predictor.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    /// Distinct values in rank order.
    Numeric(Vec<f64>),
    /// Training-time number of levels.
    Factor { cardinality: u32 },
}

/// One predictor after encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedColumn {
    runs: Vec<RleRun>,
    values: ColumnValues,
}

impl EncodedColumn {
    pub(crate) fn from_parts(runs: Vec<RleRun>, values: ColumnValues) -> Self {
        Self { runs, values }
    }

    /// Runs ordered by `(rank, row)`.
    #[inline]
    pub fn runs(&self) -> &[RleRun] {
        &self.runs
    }

    #[inline]
    pub fn values(&self) -> &ColumnValues {
        &self.values
    }

    /// Total rows covered.
    pub fn n_row(&self) -> usize {
        self.runs.iter().map(|r| r.extent).sum()
    }

    /// Number of rank slots: distinct values for numeric columns, levels plus
    /// the sentinel (when present) for factors.
    pub fn rank_count(&self) -> usize {
        match &self.values {
            ColumnValues::Numeric(values) => values.len(),
            ColumnValues::Factor { cardinality } => {
                let sentinel = self.runs.iter().any(|r| r.rank >= *cardinality);
                *cardinality as usize + usize::from(sentinel)
            }
        }
    }

    pub fn into_parts(self) -> (Vec<RleRun>, ColumnValues) {
        (self.runs, self.values)
    }
}

// =============================================================================
// RunLengthEncoder
// =============================================================================

/// Encodes columns into rank-ordered run lists.
pub struct RunLengthEncoder;

impl RunLengthEncoder {
    /// Encode a dense numeric column.
    pub fn encode_numeric<I>(column: I) -> EncodedColumn
    where
        I: IntoIterator<Item = f64>,
    {
        let triples: Vec<ValueRun<f64>> = column
            .into_iter()
            .enumerate()
            .map(|(row, value)| ValueRun::new(value, row, 1))
            .collect();
        Self::numeric_from_triples(triples)
    }

    /// Encode pre-compressed numeric triples covering `n_row` rows.
    ///
    /// # Errors
    ///
    /// Returns a [`FrameError`] if the triples do not partition `0..n_row`.
    pub fn encode_numeric_runs(
        runs: &[ValueRun<f64>],
        n_row: usize,
        predictor: usize,
    ) -> Result<EncodedColumn, FrameError> {
        validate_runs(runs, n_row, predictor)?;
        Ok(Self::numeric_from_triples(runs.to_vec()))
    }

    /// Encode a dense factor column with `cardinality` levels.
    pub fn encode_factor<I>(codes: I, cardinality: u32) -> EncodedColumn
    where
        I: IntoIterator<Item = u32>,
    {
        let triples: Vec<ValueRun<u32>> = codes
            .into_iter()
            .enumerate()
            .map(|(row, code)| ValueRun::new(code, row, 1))
            .collect();
        Self::factor_from_triples(triples, cardinality)
    }

    /// Encode pre-compressed factor triples covering `n_row` rows.
    ///
    /// # Errors
    ///
    /// Returns a [`FrameError`] if the triples do not partition `0..n_row`.
    pub fn encode_factor_runs(
        runs: &[ValueRun<u32>],
        n_row: usize,
        cardinality: u32,
        predictor: usize,
    ) -> Result<EncodedColumn, FrameError> {
        validate_runs(runs, n_row, predictor)?;
        Ok(Self::factor_from_triples(runs.to_vec(), cardinality))
    }

    fn numeric_from_triples(mut triples: Vec<ValueRun<f64>>) -> EncodedColumn {
        triples.sort_unstable_by(|a, b| {
            numeric_order(a.value, b.value).then_with(|| a.row.cmp(&b.row))
        });
        let (runs, values) = merge_sorted(&triples, |a, b| numeric_order(a, b) == Ordering::Equal);
        EncodedColumn::from_parts(runs, ColumnValues::Numeric(values))
    }

    fn factor_from_triples(mut triples: Vec<ValueRun<u32>>, cardinality: u32) -> EncodedColumn {
        for t in triples.iter_mut() {
            t.value = t.value.min(cardinality);
        }
        triples.sort_unstable_by_key(|t| (t.value, t.row));

        let mut runs: Vec<RleRun> = Vec::new();
        for t in &triples {
            match runs.last_mut() {
                Some(last) if last.rank == t.value && last.end() == t.row => last.extent += t.extent,
                _ => runs.push(RleRun::new(t.value, t.row, t.extent)),
            }
        }
        EncodedColumn::from_parts(runs, ColumnValues::Factor { cardinality })
    }
}

/// Ascending order with NaN after every number.
#[inline]
pub(crate) fn numeric_order(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Merges value-sorted triples into rank runs. Returns runs and distinct values.
fn merge_sorted<T: Copy>(
    sorted: &[ValueRun<T>],
    same: impl Fn(T, T) -> bool,
) -> (Vec<RleRun>, Vec<T>) {
    let mut runs: Vec<RleRun> = Vec::new();
    let mut distinct: Vec<T> = Vec::new();
    for t in sorted {
        let same_value = distinct.last().is_some_and(|&d| same(d, t.value));
        match runs.last_mut() {
            Some(last) if same_value && last.end() == t.row => last.extent += t.extent,
            _ => {
                if !same_value {
                    distinct.push(t.value);
                }
                runs.push(RleRun::new((distinct.len() - 1) as Rank, t.row, t.extent));
            }
        }
    }
    (runs, distinct)
}

/// Checks that triples partition `0..n_row` exactly.
fn validate_runs<T>(runs: &[ValueRun<T>], n_row: usize, predictor: usize) -> Result<(), FrameError> {
    if let Some(empty) = runs.iter().find(|r| r.extent == 0) {
        return Err(FrameError::EmptyRun { predictor, row: empty.row });
    }
    let covered: usize = runs.iter().map(|r| r.extent).sum();
    if covered != n_row {
        return Err(FrameError::RunCoverage { predictor, covered, n_row });
    }

    let mut order: Vec<(usize, usize)> = runs.iter().map(|r| (r.row, r.extent)).collect();
    order.sort_unstable();
    let mut expected = 0;
    for (row, extent) in order {
        if row != expected {
            return Err(FrameError::RunOverlap { predictor, row });
        }
        expected = row + extent;
    }
    Ok(())
}

/// Scatters a run list into one rank per row.
pub fn scatter_ranks(runs: &[RleRun], n_row: usize) -> Vec<Rank> {
    let mut ranks = vec![0; n_row];
    for run in runs {
        ranks[run.rows()].fill(run.rank);
    }
    ranks
}

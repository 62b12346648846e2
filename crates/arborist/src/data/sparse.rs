//! Sparse numeric input.
//!
//! A [`SparseMatrix`] carries nonzero values plus two of three index arrays:
//! row indices `i`, column indices `j`, and pointers `p`. Which pair is
//! non-empty selects the convention:
//!
//! | non-empty | convention |
//! |-----------|------------|
//! | `i`, `p`  | compressed sparse column (`p` indexes columns) |
//! | `j`, `p`  | compressed sparse row (`p` indexes rows) |
//! | `i`, `j`  | coordinate triplets |
//!
//! Conversion yields per-column `(value, row, extent)` triples in which every
//! implicit zero is materialized as a run, ready for the run-length encoder.

use super::error::FrameError;
use super::rle::ValueRun;

/// Index convention of a [`SparseMatrix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SparseConvention {
    ColumnCompressed,
    RowCompressed,
    Coordinate,
}

/// Sparse numeric block with `n_row` rows and `n_col` predictors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseMatrix {
    pub n_row: usize,
    pub n_col: usize,
    pub values: Vec<f64>,
    pub i: Vec<usize>,
    pub j: Vec<usize>,
    pub p: Vec<usize>,
}

impl SparseMatrix {
    /// Compressed sparse column: `row_idx[k]` is the row of `values[k]`,
    /// column `c` owns entries `col_ptr[c]..col_ptr[c + 1]`.
    pub fn csc(
        n_row: usize,
        n_col: usize,
        values: Vec<f64>,
        row_idx: Vec<usize>,
        col_ptr: Vec<usize>,
    ) -> Self {
        Self { n_row, n_col, values, i: row_idx, j: Vec::new(), p: col_ptr }
    }

    /// Compressed sparse row: `col_idx[k]` is the column of `values[k]`,
    /// row `r` owns entries `row_ptr[r]..row_ptr[r + 1]`.
    pub fn csr(
        n_row: usize,
        n_col: usize,
        values: Vec<f64>,
        col_idx: Vec<usize>,
        row_ptr: Vec<usize>,
    ) -> Self {
        Self { n_row, n_col, values, i: Vec::new(), j: col_idx, p: row_ptr }
    }

    /// Coordinate triplets `(row_idx[k], col_idx[k], values[k])`.
    pub fn coo(
        n_row: usize,
        n_col: usize,
        values: Vec<f64>,
        row_idx: Vec<usize>,
        col_idx: Vec<usize>,
    ) -> Self {
        Self { n_row, n_col, values, i: row_idx, j: col_idx, p: Vec::new() }
    }

    /// Determines the index convention from which arrays are non-empty.
    ///
    /// # Errors
    ///
    /// [`FrameError::AmbiguousSparse`] when all three index arrays are set,
    /// [`FrameError::IncompleteSparse`] when fewer than two are.
    pub fn convention(&self) -> Result<SparseConvention, FrameError> {
        match (!self.i.is_empty(), !self.j.is_empty(), !self.p.is_empty()) {
            (true, true, true) => Err(FrameError::AmbiguousSparse),
            (true, false, true) => Ok(SparseConvention::ColumnCompressed),
            (false, true, true) => Ok(SparseConvention::RowCompressed),
            (true, true, false) => Ok(SparseConvention::Coordinate),
            // An all-zero compressed matrix has pointers but no indices.
            (false, false, true) if self.values.is_empty() => {
                if self.p.len() == self.n_col + 1 {
                    Ok(SparseConvention::ColumnCompressed)
                } else {
                    Ok(SparseConvention::RowCompressed)
                }
            }
            _ => Err(FrameError::IncompleteSparse),
        }
    }

    /// Per-column triples covering every row, implicit zeros included.
    ///
    /// # Errors
    ///
    /// Any convention or shape error, see [`FrameError`].
    pub fn column_runs(&self) -> Result<Vec<Vec<ValueRun<f64>>>, FrameError> {
        let convention = self.convention()?;
        let nnz = match convention {
            SparseConvention::ColumnCompressed | SparseConvention::Coordinate => self.i.len(),
            SparseConvention::RowCompressed => self.j.len(),
        };
        if self.values.is_empty() && nnz > 0 {
            return Err(FrameError::PatternMatrix);
        }
        if self.values.len() != nnz {
            return Err(shape(format!(
                "{} values for {} indices",
                self.values.len(),
                nnz
            )));
        }

        let columns = match convention {
            SparseConvention::ColumnCompressed => self.csc_entries()?,
            SparseConvention::RowCompressed => self.csr_entries()?,
            SparseConvention::Coordinate => self.coo_entries()?,
        };

        columns
            .into_iter()
            .enumerate()
            .map(|(col, mut entries)| {
                entries.sort_unstable_by_key(|&(row, _)| row);
                if let Some(pair) = entries.windows(2).find(|w| w[0].0 == w[1].0) {
                    return Err(shape(format!("duplicate entry at row {}, column {}", pair[0].0, col)));
                }
                Ok(fill_zeros(&entries, self.n_row))
            })
            .collect()
    }

    fn csc_entries(&self) -> Result<Vec<Vec<(usize, f64)>>, FrameError> {
        check_pointers(&self.p, self.n_col, self.i.len(), "column")?;
        let mut columns = Vec::with_capacity(self.n_col);
        for col in 0..self.n_col {
            let range = self.p[col]..self.p[col + 1];
            let mut entries = Vec::with_capacity(range.len());
            for k in range {
                let row = self.i[k];
                if row >= self.n_row {
                    return Err(shape(format!("row index {} out of bounds ({} rows)", row, self.n_row)));
                }
                entries.push((row, self.values[k]));
            }
            columns.push(entries);
        }
        Ok(columns)
    }

    fn csr_entries(&self) -> Result<Vec<Vec<(usize, f64)>>, FrameError> {
        check_pointers(&self.p, self.n_row, self.j.len(), "row")?;
        let mut columns = vec![Vec::new(); self.n_col];
        for row in 0..self.n_row {
            for k in self.p[row]..self.p[row + 1] {
                let col = self.j[k];
                let entries: &mut Vec<(usize, f64)> = columns.get_mut(col).ok_or_else(|| {
                    shape(format!("column index {} out of bounds ({} columns)", col, self.n_col))
                })?;
                entries.push((row, self.values[k]));
            }
        }
        Ok(columns)
    }

    fn coo_entries(&self) -> Result<Vec<Vec<(usize, f64)>>, FrameError> {
        if self.i.len() != self.j.len() {
            return Err(shape(format!(
                "{} row indices for {} column indices",
                self.i.len(),
                self.j.len()
            )));
        }
        let mut columns = vec![Vec::new(); self.n_col];
        for ((&row, &col), &value) in self.i.iter().zip(&self.j).zip(&self.values) {
            if row >= self.n_row {
                return Err(shape(format!("row index {} out of bounds ({} rows)", row, self.n_row)));
            }
            let entries: &mut Vec<(usize, f64)> = columns.get_mut(col).ok_or_else(|| {
                shape(format!("column index {} out of bounds ({} columns)", col, self.n_col))
            })?;
            entries.push((row, value));
        }
        Ok(columns)
    }
}

fn shape(msg: String) -> FrameError {
    FrameError::SparseShape(msg)
}

fn check_pointers(p: &[usize], n_outer: usize, nnz: usize, axis: &str) -> Result<(), FrameError> {
    if p.len() != n_outer + 1 {
        return Err(shape(format!(
            "{} pointer array has length {}, expected {}",
            axis,
            p.len(),
            n_outer + 1
        )));
    }
    if p[0] != 0 || p[n_outer] != nnz {
        return Err(shape(format!(
            "{} pointers must span 0..{}, got {}..{}",
            axis, nnz, p[0], p[n_outer]
        )));
    }
    if p.windows(2).any(|w| w[0] > w[1]) {
        return Err(shape(format!("{} pointers decrease", axis)));
    }
    Ok(())
}

/// Expands row-sorted nonzeros into triples with explicit zero runs.
fn fill_zeros(entries: &[(usize, f64)], n_row: usize) -> Vec<ValueRun<f64>> {
    let mut runs = Vec::with_capacity(2 * entries.len() + 1);
    let mut next = 0;
    for &(row, value) in entries {
        if row > next {
            runs.push(ValueRun::new(0.0, next, row - next));
        }
        runs.push(ValueRun::new(value, row, 1));
        next = row + 1;
    }
    if next < n_row {
        runs.push(ValueRun::new(0.0, next, n_row - next));
    }
    runs
}

// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use crate::{error::ErrorKind, factors::FactorMatrix};
use anyhow::Error;

/// Compressed sparse row matrix of `f64`
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    n_cols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    pub fn empty(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_cols,
            row_ptr: vec![0; n_rows + 1],
            col_idx: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Builds the matrix from per-row `(column, value)` entries. Columns are
    /// sorted within each row and zero values are dropped.
    pub fn from_rows(rows: Vec<Vec<(usize, f64)>>, n_cols: usize) -> Result<Self, Error> {
        let mut matrix = Self::empty(0, n_cols);

        for mut row in rows {
            row.sort_by_key(|(col, _)| *col);
            for (col, value) in row {
                if col >= n_cols {
                    return Err(ErrorKind::DimensionMismatch {
                        name: "sparse",
                        rows: matrix.n_rows() + 1,
                        cols: col + 1,
                        expected_rows: matrix.n_rows() + 1,
                        expected_cols: n_cols,
                    }
                    .into());
                }

                if value != 0.0 {
                    matrix.col_idx.push(col);
                    matrix.values.push(value);
                }
            }

            matrix.row_ptr.push(matrix.col_idx.len());
        }

        Ok(matrix)
    }

    pub fn n_rows(&self) -> usize {
        self.row_ptr.len() - 1
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Number of stored entries
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Non-zero entries of `row` in column order, empty past the last row
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let (start, end) = self.bounds(row);
        self.col_idx[start..end]
            .iter()
            .copied()
            .zip(self.values[start..end].iter().copied())
    }

    pub fn row_nnz(&self, row: usize) -> usize {
        let (start, end) = self.bounds(row);
        end - start
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        let (start, end) = self.bounds(row);
        match self.col_idx[start..end].binary_search(&col) {
            Ok(pos) => self.values[start + pos],
            Err(_) => 0.0,
        }
    }

    pub fn row_sum(&self, row: usize) -> f64 {
        self.row(row).map(|(_, value)| value).sum()
    }

    /// Scales every row to sum to one, rows summing to zero become empty
    pub fn normalize_rows(&mut self) {
        for row in 0..self.n_rows() {
            let (start, end) = self.bounds(row);
            let sum: f64 = self.values[start..end].iter().sum();

            for value in &mut self.values[start..end] {
                *value = if sum != 0.0 { *value / sum } else { 0.0 };
            }
        }

        self.prune_zeros();
    }

    /// `Σ_j M[row, j] · factors[j]`
    pub fn weighted_sum(&self, row: usize, factors: &FactorMatrix) -> Result<Vec<f64>, Error> {
        if row >= self.n_rows() {
            return Err(ErrorKind::MissingAffinity(row).into());
        }

        let mut sum = vec![0.0; factors.n_cols()];
        for (col, weight) in self.row(row) {
            factors.with_row(col, |values| {
                for (acc, x) in sum.iter_mut().zip(values.iter()) {
                    *acc += weight * x;
                }
            })?;
        }

        Ok(sum)
    }

    pub fn to_dense(&self) -> Vec<Vec<f64>> {
        (0..self.n_rows())
            .map(|row| {
                let mut dense = vec![0.0; self.n_cols];
                for (col, value) in self.row(row) {
                    dense[col] = value;
                }
                dense
            })
            .collect()
    }

    // rows past `n_rows` read as empty
    fn bounds(&self, row: usize) -> (usize, usize) {
        match (self.row_ptr.get(row), self.row_ptr.get(row + 1)) {
            (Some(&start), Some(&end)) => (start, end),
            _ => (0, 0),
        }
    }

    fn prune_zeros(&mut self) {
        let mut row_ptr = Vec::with_capacity(self.row_ptr.len());
        let mut col_idx = Vec::with_capacity(self.col_idx.len());
        let mut values = Vec::with_capacity(self.values.len());
        row_ptr.push(0);

        for row in 0..self.n_rows() {
            for (col, value) in self.row(row) {
                if value != 0.0 {
                    col_idx.push(col);
                    values.push(value);
                }
            }
            row_ptr.push(col_idx.len());
        }

        self.row_ptr = row_ptr;
        self.col_idx = col_idx;
        self.values = values;
    }
}

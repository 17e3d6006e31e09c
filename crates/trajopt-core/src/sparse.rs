//! Sparse Jacobian blocks
//!
//! A [`Jacobian`] holds ∂g/∂x for one constraint `g` and one variable set `x`.
//! Its shape is fixed when it is created: rows = residual dimension of the
//! constraint, columns = dimension of the variable set. Blocks are never
//! resized.
//!
//! Entries are kept in row-major order so that iteration, conversion to CSR
//! and assembly into a global matrix are deterministic.
//!
//! # Sparsity Pattern
//!
//! Trajectory constraints touch few variables per row (a spline sample only
//! depends on the two nodes around it), so blocks are stored as triplets and
//! only converted to compressed form when the driver asks for it.

use std::collections::BTreeMap;

use nalgebra::DMatrix;
use nalgebra_sparse::CooMatrix;

/// Fixed-shape sparse matrix used for constraint Jacobian blocks
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Jacobian {
    nrows: usize,
    ncols: usize,
    /// (row, col) -> value, row-major ordered
    entries: BTreeMap<(usize, usize), f64>,
}

impl Jacobian {
    /// All-zero block with no stored entries
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            entries: BTreeMap::new(),
        }
    }

    /// Build a block from (row, col, value) triplets, summing duplicates
    pub fn from_triplets(nrows: usize, ncols: usize, triplets: &[(usize, usize, f64)]) -> Self {
        let mut jac = Self::zeros(nrows, ncols);
        for &(row, col, val) in triplets {
            jac.add(row, col, val);
        }
        jac
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// Number of stored entries (explicitly written zeros included)
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    /// Value at (row, col), zero if nothing was stored there
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.entries.get(&(row, col)).copied().unwrap_or(0.0)
    }

    /// Overwrite the entry at (row, col)
    ///
    /// # Panics
    ///
    /// If (row, col) lies outside the block, like indexing a dense matrix.
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.check_index(row, col);
        self.entries.insert((row, col), value);
    }

    /// Accumulate into the entry at (row, col)
    ///
    /// # Panics
    ///
    /// If (row, col) lies outside the block.
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.check_index(row, col);
        *self.entries.entry((row, col)).or_insert(0.0) += value;
    }

    /// Drop every stored entry; the shape is kept
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate stored entries as (row, col, value) in row-major order
    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.entries.iter().map(|(&(row, col), &val)| (row, col, val))
    }

    /// Stored entries of one row as (col, value)
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.entries
            .range((row, 0)..(row + 1, 0))
            .map(|(&(_, col), &val)| (col, val))
    }

    /// Whether every stored entry is exactly zero
    pub fn is_zero(&self) -> bool {
        self.entries.values().all(|&v| v == 0.0)
    }

    /// Push all entries into a larger COO matrix at the given offset
    pub fn append_to(&self, coo: &mut CooMatrix<f64>, row_offset: usize, col_offset: usize) {
        for (row, col, val) in self.triplets() {
            coo.push(row_offset + row, col_offset + col, val);
        }
    }

    /// Dense copy of the block, mostly for tests and diagnostics
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.nrows, self.ncols);
        for (row, col, val) in self.triplets() {
            dense[(row, col)] = val;
        }
        dense
    }

    fn check_index(&self, row: usize, col: usize) {
        assert!(
            row < self.nrows && col < self.ncols,
            "Jacobian index ({}, {}) out of bounds for {}x{} block",
            row,
            col,
            self.nrows,
            self.ncols
        );
    }
}

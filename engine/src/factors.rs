// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use crate::{
    error::ErrorKind,
    mode::{Factor, Mode},
    utils::project_onto_ball,
};
use anyhow::Error;
use controller::{ItemId, UserId};
use parking_lot::RwLock;
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::collections::HashMap;

/// Bijection between external ids and dense indices `0..len`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdMapping {
    to_internal: HashMap<i64, usize>,
    to_external: Vec<i64>,
}

impl IdMapping {
    /// Maps the ids in first-seen order, repeated ids are ignored
    pub fn from_ids<I: IntoIterator<Item = i64>>(ids: I) -> Self {
        let mut mapping = Self::default();
        for id in ids {
            mapping.insert(id);
        }

        mapping
    }

    /// Index of `id`, allocating the next one if it's new
    pub fn insert(&mut self, id: i64) -> usize {
        if let Some(&index) = self.to_internal.get(&id) {
            return index;
        }

        let index = self.to_external.len();
        self.to_internal.insert(id, index);
        self.to_external.push(id);
        index
    }

    pub fn internal(&self, id: i64) -> Option<usize> {
        self.to_internal.get(&id).copied()
    }

    pub fn external(&self, index: usize) -> Option<i64> {
        self.to_external.get(index).copied()
    }

    pub fn externals(&self) -> &[i64] {
        &self.to_external
    }

    pub fn len(&self) -> usize {
        self.to_external.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_external.is_empty()
    }
}

/// Normal sampler used for cold-start rows
pub struct NormalInit {
    normal: Normal<f64>,
    rng: StdRng,
}

impl NormalInit {
    pub fn new(mean: f64, std_dev: f64, seed: Option<u64>) -> Result<Self, Error> {
        let normal = Normal::new(mean, std_dev)
            .map_err(|e| ErrorKind::InvalidConfiguration(format!("normal init: {}", e)))?;

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self { normal, rng })
    }

    fn sample_row(&mut self, len: usize) -> Vec<f64> {
        (0..len).map(|_| self.normal.sample(&mut self.rng)).collect()
    }
}

/// Dense row-major matrix where every row sits behind its own lock, so
/// workers touching different rows never contend
#[derive(Debug)]
pub struct FactorMatrix {
    n_cols: usize,
    rows: Vec<RwLock<Vec<f64>>>,
}

impl FactorMatrix {
    pub fn zeros(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_cols,
            rows: (0..n_rows).map(|_| RwLock::new(vec![0.0; n_cols])).collect(),
        }
    }

    pub fn from_rows(rows: Vec<Vec<f64>>, n_cols: usize) -> Result<Self, Error> {
        let n_rows = rows.len();
        if let Some(bad) = rows.iter().find(|row| row.len() != n_cols) {
            return Err(ErrorKind::DimensionMismatch {
                name: "factor",
                rows: n_rows,
                cols: bad.len(),
                expected_rows: n_rows,
                expected_cols: n_cols,
            }
            .into());
        }

        Ok(Self {
            n_cols,
            rows: rows.into_iter().map(RwLock::new).collect(),
        })
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    fn lock(&self, row: usize) -> Result<&RwLock<Vec<f64>>, Error> {
        self.rows
            .get(row)
            .ok_or_else(|| ErrorKind::IndexOutOfBound(row).into())
    }

    pub fn row(&self, row: usize) -> Result<Vec<f64>, Error> {
        Ok(self.lock(row)?.read().to_vec())
    }

    pub fn with_row<R, F>(&self, row: usize, f: F) -> Result<R, Error>
    where
        F: FnOnce(&[f64]) -> R,
    {
        Ok(f(self.lock(row)?.read().as_slice()))
    }

    pub fn set_row(&self, row: usize, values: &[f64]) -> Result<(), Error> {
        if values.len() != self.n_cols {
            return Err(ErrorKind::DimensionMismatch {
                name: "factor row",
                rows: 1,
                cols: values.len(),
                expected_rows: 1,
                expected_cols: self.n_cols,
            }
            .into());
        }

        self.lock(row)?.write().copy_from_slice(values);
        Ok(())
    }

    /// Applies `f` to the row and projects the result onto the ball of the
    /// given radius, all under one write lock. Returns the previous row.
    pub fn update_projected<F>(&self, row: usize, radius: f64, f: F) -> Result<Vec<f64>, Error>
    where
        F: FnOnce(&mut [f64]),
    {
        let mut guard = self.lock(row)?.write();
        let previous = guard.to_vec();

        f(guard.as_mut_slice());
        project_onto_ball(guard.as_mut_slice(), radius);

        Ok(previous)
    }

    pub fn fill_normal(&self, init: &mut NormalInit) {
        for row in &self.rows {
            *row.write() = init.sample_row(self.n_cols);
        }
    }

    pub fn push_row(&mut self, values: Vec<f64>) -> usize {
        self.rows.push(RwLock::new(values));
        self.rows.len() - 1
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.rows.iter().map(|row| row.read().to_vec()).collect()
    }
}

impl Clone for FactorMatrix {
    fn clone(&self) -> Self {
        Self {
            n_cols: self.n_cols,
            rows: self.rows.iter().map(|row| RwLock::new(row.read().to_vec())).collect(),
        }
    }
}

/// Owns the factor matrices of a model together with its id mappings
#[derive(Debug, Clone)]
pub struct LatentFactorStore {
    mode: Mode,
    dimensions: usize,
    range_size: usize,
    users: IdMapping,
    items: IdMapping,
    matrices: HashMap<Factor, FactorMatrix>,
}

impl LatentFactorStore {
    /// Zero-filled store with exactly the matrices `mode` needs
    pub fn for_mode(
        mode: Mode,
        users: IdMapping,
        items: IdMapping,
        dimensions: usize,
        range_size: usize,
    ) -> Self {
        let mut store = Self {
            mode,
            dimensions,
            range_size,
            users,
            items,
            matrices: HashMap::new(),
        };

        for factor in mode.factors() {
            let rows = store.expected_rows(factor);
            store.matrices.insert(factor, FactorMatrix::zeros(rows, dimensions));
        }

        store
    }

    /// Store over caller-provided matrices, rejecting any matrix that doesn't
    /// fit the mode
    pub fn from_matrices(
        mode: Mode,
        users: IdMapping,
        items: IdMapping,
        dimensions: usize,
        range_size: usize,
        matrices: Vec<(Factor, FactorMatrix)>,
    ) -> Result<Self, Error> {
        let store = Self {
            mode,
            dimensions,
            range_size,
            users,
            items,
            matrices: matrices.into_iter().collect(),
        };

        store.check_dimensions()?;
        Ok(store)
    }

    fn expected_rows(&self, factor: Factor) -> usize {
        if factor.is_user() {
            self.users.len()
        } else if factor.is_item() {
            self.items.len()
        } else {
            self.range_size
        }
    }

    pub fn check_dimensions(&self) -> Result<(), Error> {
        if let Some(extra) = self.matrices.keys().find(|f| !self.mode.carries(**f)) {
            return Err(ErrorKind::UnsupportedMode(self.mode.name(), extra.name()).into());
        }

        for factor in self.mode.factors() {
            let matrix = self.matrix(factor)?;
            let expected_rows = self.expected_rows(factor);

            if matrix.n_rows() != expected_rows || matrix.n_cols() != self.dimensions {
                return Err(ErrorKind::DimensionMismatch {
                    name: factor.name(),
                    rows: matrix.n_rows(),
                    cols: matrix.n_cols(),
                    expected_rows,
                    expected_cols: self.dimensions,
                }
                .into());
            }
        }

        Ok(())
    }

    pub fn init_normal(&self, init: &mut NormalInit) {
        for factor in self.mode.factors() {
            if let Some(matrix) = self.matrices.get(&factor) {
                matrix.fill_normal(init);
            }
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn range_size(&self) -> usize {
        self.range_size
    }

    pub fn users(&self) -> &IdMapping {
        &self.users
    }

    pub fn items(&self) -> &IdMapping {
        &self.items
    }

    pub fn user_index(&self, user: UserId) -> Result<usize, Error> {
        self.users
            .internal(user)
            .ok_or_else(|| ErrorKind::UnmappedUser(user).into())
    }

    pub fn item_index(&self, item: ItemId) -> Result<usize, Error> {
        self.items
            .internal(item)
            .ok_or_else(|| ErrorKind::UnmappedItem(item).into())
    }

    pub fn matrix(&self, factor: Factor) -> Result<&FactorMatrix, Error> {
        self.matrices
            .get(&factor)
            .ok_or_else(|| ErrorKind::UnsupportedMode(self.mode.name(), factor.name()).into())
    }

    pub fn get_row(&self, factor: Factor, row: usize) -> Result<Vec<f64>, Error> {
        self.matrix(factor)?.row(row)
    }

    pub fn set_row(&self, factor: Factor, row: usize, values: &[f64]) -> Result<(), Error> {
        self.matrix(factor)?.set_row(row, values)
    }

    /// Maps a new user, giving it freshly sampled rows
    pub fn add_user(&mut self, user: UserId, init: &mut NormalInit) -> usize {
        if let Some(index) = self.users.internal(user) {
            return index;
        }

        let index = self.users.insert(user);
        self.push_rows(Factor::is_user, init);
        index
    }

    /// Maps a new item, giving it freshly sampled rows
    pub fn add_item(&mut self, item: ItemId, init: &mut NormalInit) -> usize {
        if let Some(index) = self.items.internal(item) {
            return index;
        }

        let index = self.items.insert(item);
        self.push_rows(Factor::is_item, init);
        index
    }

    fn push_rows(&mut self, belongs: fn(Factor) -> bool, init: &mut NormalInit) {
        let dimensions = self.dimensions;
        let mut factors: Vec<_> = self.matrices.keys().copied().filter(|f| belongs(*f)).collect();
        factors.sort_by_key(|f| f.name());

        for factor in factors {
            if let Some(matrix) = self.matrices.get_mut(&factor) {
                matrix.push_row(init.sample_row(dimensions));
            }
        }
    }

    /// Zeroes every row of the user, its mapping is kept
    pub fn remove_user(&self, user: UserId) -> Result<(), Error> {
        let index = self.user_index(user)?;
        self.zero_rows(Factor::is_user, index)
    }

    /// Zeroes every row of the item, its mapping is kept
    pub fn remove_item(&self, item: ItemId) -> Result<(), Error> {
        let index = self.item_index(item)?;
        self.zero_rows(Factor::is_item, index)
    }

    fn zero_rows(&self, belongs: fn(Factor) -> bool, index: usize) -> Result<(), Error> {
        let zeros = vec![0.0; self.dimensions];
        for (factor, matrix) in &self.matrices {
            if belongs(*factor) {
                matrix.set_row(index, &zeros)?;
            }
        }

        Ok(())
    }
}

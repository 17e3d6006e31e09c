//! Dependent-variable registry
//!
//! Each constraint records which variable sets influence its residual. For
//! every such set it keeps a [`VarPair`]: the handle of the set and the
//! constraint's own Jacobian block ∂g/∂x of shape
//! `(num_rows, dim(x))`. Alongside, a [`VariableSnapshot`] holds the values
//! pulled from the problem at the last refresh.
//!
//! Subscription order is insertion order and never changes afterwards.

use nalgebra::DVector;

use crate::error::{NlpError, NlpResult};
use crate::sparse::Jacobian;
use crate::variables::{OptimizationVariables, VariableHandle};

/// A dependent variable set and the Jacobian block w.r.t. it
#[derive(Debug, Clone)]
pub struct VarPair {
    handle: VariableHandle,
    jacobian: Jacobian,
}

impl VarPair {
    pub fn handle(&self) -> &VariableHandle {
        &self.handle
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn jacobian(&self) -> &Jacobian {
        &self.jacobian
    }
}

/// Values of the dependent sets as of the last refresh
#[derive(Debug, Clone, Default)]
pub struct VariableSnapshot {
    entries: Vec<(String, DVector<f64>)>,
}

impl VariableSnapshot {
    /// Values of the named set
    pub fn get(&self, name: &str) -> NlpResult<&DVector<f64>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| NlpError::UnknownVariableSet(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }
}

/// Jacobian blocks of one constraint, in subscription order
#[derive(Debug, Clone)]
pub struct JacobianBlocks {
    num_rows: usize,
    pairs: Vec<VarPair>,
}

impl JacobianBlocks {
    fn new(num_rows: usize) -> Self {
        Self {
            num_rows,
            pairs: Vec::new(),
        }
    }

    /// Residual dimension shared by every block
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.pairs.iter().position(|p| p.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Block w.r.t. the named set
    pub fn get(&self, name: &str) -> NlpResult<&Jacobian> {
        self.position(name)
            .map(|i| &self.pairs[i].jacobian)
            .ok_or_else(|| NlpError::UnknownVariableSet(name.to_string()))
    }

    /// Writable block w.r.t. the named set; the shape cannot change
    pub fn get_mut(&mut self, name: &str) -> NlpResult<&mut Jacobian> {
        match self.position(name) {
            Some(i) => Ok(&mut self.pairs[i].jacobian),
            None => Err(NlpError::UnknownVariableSet(name.to_string())),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &VarPair> {
        self.pairs.iter()
    }

    /// (set name, writable block) in subscription order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Jacobian)> {
        self.pairs
            .iter_mut()
            .map(|p| (p.handle.name(), &mut p.jacobian))
    }

    /// Reset every block to zero without touching its shape
    pub fn clear(&mut self) {
        for pair in &mut self.pairs {
            pair.jacobian.clear();
        }
    }
}

/// Per-constraint record of dependent variable sets
#[derive(Debug, Clone)]
pub struct DependentVariables {
    blocks: JacobianBlocks,
    snapshot: VariableSnapshot,
}

impl DependentVariables {
    /// Empty registry for a residual of `num_rows` rows
    pub fn new(num_rows: usize) -> Self {
        Self {
            blocks: JacobianBlocks::new(num_rows),
            snapshot: VariableSnapshot::default(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.blocks.num_rows
    }

    /// Number of dependent sets
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Names of the dependent sets in subscription order
    pub fn names(&self) -> Vec<&str> {
        self.blocks.iter().map(|p| p.name()).collect()
    }

    /// Add a dependency with a zero Jacobian block of shape `(num_rows, dim)`
    ///
    /// Fails without modifying the registry if `num_rows` differs from the
    /// residual dimension or the set is already a dependency.
    pub fn subscribe(&mut self, handle: &VariableHandle, num_rows: usize) -> NlpResult<()> {
        if num_rows != self.blocks.num_rows {
            return Err(NlpError::ShapeMismatch {
                expected: self.blocks.num_rows,
                got: num_rows,
            });
        }
        if self.blocks.contains(handle.name()) {
            return Err(NlpError::DuplicateDependency(handle.name().to_string()));
        }

        self.blocks.pairs.push(VarPair {
            handle: handle.clone(),
            jacobian: Jacobian::zeros(num_rows, handle.len()),
        });
        self.snapshot
            .entries
            .push((handle.name().to_string(), DVector::zeros(handle.len())));

        tracing::debug!(
            set = handle.name(),
            rows = num_rows,
            cols = handle.len(),
            "subscribed to variable set"
        );
        Ok(())
    }

    /// Pull current values of every dependent set
    ///
    /// All-or-nothing: if any set cannot be resolved or changed dimension
    /// the previous snapshot is kept.
    pub fn refresh(&mut self, variables: &OptimizationVariables) -> NlpResult<()> {
        let mut entries = Vec::with_capacity(self.blocks.len());
        for pair in self.blocks.iter() {
            let values = variables.resolve(&pair.handle)?.values();
            if values.len() != pair.jacobian.ncols() {
                return Err(NlpError::DimensionMismatch {
                    set: pair.name().to_string(),
                    expected: pair.jacobian.ncols(),
                    got: values.len(),
                });
            }
            entries.push((pair.name().to_string(), values));
        }
        self.snapshot.entries = entries;
        Ok(())
    }

    /// Values of a dependent set as of the last refresh
    pub fn values(&self, name: &str) -> NlpResult<&DVector<f64>> {
        self.snapshot.get(name)
    }

    pub fn jacobian(&self, name: &str) -> NlpResult<&Jacobian> {
        self.blocks.get(name)
    }

    pub fn jacobian_mut(&mut self, name: &str) -> NlpResult<&mut Jacobian> {
        self.blocks.get_mut(name)
    }

    pub fn snapshot(&self) -> &VariableSnapshot {
        &self.snapshot
    }

    pub fn blocks(&self) -> &JacobianBlocks {
        &self.blocks
    }

    /// Read the snapshot while writing Jacobian blocks
    pub fn split_mut(&mut self) -> (&VariableSnapshot, &mut JacobianBlocks) {
        (&self.snapshot, &mut self.blocks)
    }

    /// Every block must be `num_rows × dim(set)`
    pub fn check_shapes(&self) -> NlpResult<()> {
        for pair in self.blocks.iter() {
            let (rows, cols) = pair.jacobian.shape();
            if rows != self.blocks.num_rows || cols != pair.handle.len() {
                return Err(NlpError::InvariantViolation(format!(
                    "block for {} is {}x{}, expected {}x{}",
                    pair.name(),
                    rows,
                    cols,
                    self.blocks.num_rows,
                    pair.handle.len()
                )));
            }
        }
        Ok(())
    }
}

//! Decision variables
//!
//! Variables are grouped into named [`VariableSet`]s (spline nodes, phase
//! durations, ...). [`OptimizationVariables`] owns every set of a problem in
//! insertion order; the order defines the column layout of the global
//! Jacobian.
//!
//! Constraints never own variable sets. They hold a [`VariableHandle`]
//! (name, registry slot, dimension) and pull a copy of the current values
//! when refreshed.

use nalgebra::DVector;

use crate::bounds::{Bounds, VecBound};
use crate::error::{NlpError, NlpResult};

/// A named, fixed-dimension block of decision variables
pub trait VariableSet: Send {
    /// Unique name used to key Jacobian blocks
    fn name(&self) -> &str;

    /// Number of scalar variables
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current values as a dense vector
    fn values(&self) -> DVector<f64>;

    /// Overwrite all values; the length must match [`VariableSet::len`]
    fn set_values(&mut self, values: &[f64]) -> NlpResult<()>;

    /// Per-variable bounds, one entry per variable
    fn bounds(&self) -> VecBound;
}

/// Non-owning reference to a registered variable set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableHandle {
    name: String,
    index: usize,
    len: usize,
}

impl VariableHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Slot in the owning [`OptimizationVariables`]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Dimension of the set at registration time
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Plain named vector of variables with per-entry bounds
#[derive(Debug, Clone)]
pub struct VectorVariables {
    name: String,
    values: DVector<f64>,
    bounds: VecBound,
}

impl VectorVariables {
    /// Unbounded variables initialized to `values`
    pub fn new(name: impl Into<String>, values: DVector<f64>) -> Self {
        let bounds = vec![Bounds::NONE; values.len()];
        Self {
            name: name.into(),
            values,
            bounds,
        }
    }

    /// `len` unbounded variables initialized to zero
    pub fn zeros(name: impl Into<String>, len: usize) -> Self {
        Self::new(name, DVector::zeros(len))
    }

    /// Replace the bounds, one per variable
    pub fn with_bounds(mut self, bounds: VecBound) -> NlpResult<Self> {
        if bounds.len() != self.values.len() {
            return Err(NlpError::DimensionMismatch {
                set: self.name,
                expected: self.values.len(),
                got: bounds.len(),
            });
        }
        self.bounds = bounds;
        Ok(self)
    }
}

impl VariableSet for VectorVariables {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn values(&self) -> DVector<f64> {
        self.values.clone()
    }

    fn set_values(&mut self, values: &[f64]) -> NlpResult<()> {
        if values.len() != self.values.len() {
            return Err(NlpError::DimensionMismatch {
                set: self.name.clone(),
                expected: self.values.len(),
                got: values.len(),
            });
        }
        self.values.copy_from_slice(values);
        Ok(())
    }

    fn bounds(&self) -> VecBound {
        self.bounds.clone()
    }
}

/// Owner of every variable set of one problem
#[derive(Default)]
pub struct OptimizationVariables {
    sets: Vec<Box<dyn VariableSet>>,
}

impl OptimizationVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a set and return a handle to it
    pub fn add<V: VariableSet + 'static>(&mut self, set: V) -> NlpResult<VariableHandle> {
        self.add_boxed(Box::new(set))
    }

    pub fn add_boxed(&mut self, set: Box<dyn VariableSet>) -> NlpResult<VariableHandle> {
        if self.index_of(set.name()).is_some() {
            return Err(NlpError::DuplicateVariableSet(set.name().to_string()));
        }
        let handle = VariableHandle {
            name: set.name().to_string(),
            index: self.sets.len(),
            len: set.len(),
        };
        tracing::debug!(set = %handle.name, len = handle.len, "registered variable set");
        self.sets.push(set);
        Ok(handle)
    }

    /// Number of registered sets
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Total number of scalar variables over all sets
    pub fn total_len(&self) -> usize {
        self.sets.iter().map(|s| s.len()).sum()
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.sets.iter().position(|s| s.name() == name)
    }

    fn set(&self, name: &str) -> NlpResult<&dyn VariableSet> {
        self.index_of(name)
            .map(|i| self.sets[i].as_ref())
            .ok_or_else(|| NlpError::UnknownVariableSet(name.to_string()))
    }

    /// Resolve a handle, falling back to a name lookup if the slot moved
    pub fn resolve(&self, handle: &VariableHandle) -> NlpResult<&dyn VariableSet> {
        match self.sets.get(handle.index) {
            Some(set) if set.name() == handle.name => Ok(set.as_ref()),
            _ => self.set(&handle.name),
        }
    }

    /// Handle for the named set
    pub fn handle(&self, name: &str) -> NlpResult<VariableHandle> {
        let index = self
            .index_of(name)
            .ok_or_else(|| NlpError::UnknownVariableSet(name.to_string()))?;
        Ok(VariableHandle {
            name: name.to_string(),
            index,
            len: self.sets[index].len(),
        })
    }

    /// Current values of the named set
    pub fn values(&self, name: &str) -> NlpResult<DVector<f64>> {
        Ok(self.set(name)?.values())
    }

    /// Dimension of the named set
    pub fn size(&self, name: &str) -> NlpResult<usize> {
        Ok(self.set(name)?.len())
    }

    /// Names of all sets in insertion order
    pub fn set_names(&self) -> Vec<&str> {
        self.sets.iter().map(|s| s.name()).collect()
    }

    /// Column offset of the named set in the stacked variable vector
    pub fn offset(&self, name: &str) -> NlpResult<usize> {
        let index = self
            .index_of(name)
            .ok_or_else(|| NlpError::UnknownVariableSet(name.to_string()))?;
        Ok(self.sets[..index].iter().map(|s| s.len()).sum())
    }

    /// Overwrite the values of one set
    pub fn set_values(&mut self, name: &str, values: &[f64]) -> NlpResult<()> {
        let index = self
            .index_of(name)
            .ok_or_else(|| NlpError::UnknownVariableSet(name.to_string()))?;
        self.sets[index].set_values(values)
    }

    /// All values stacked in insertion order
    pub fn values_flat(&self) -> DVector<f64> {
        let mut x = Vec::with_capacity(self.total_len());
        for set in &self.sets {
            x.extend(set.values().iter());
        }
        DVector::from_vec(x)
    }

    /// Split a stacked vector across the sets in insertion order
    pub fn set_values_flat(&mut self, x: &[f64]) -> NlpResult<()> {
        let total = self.total_len();
        if x.len() != total {
            return Err(NlpError::DimensionMismatch {
                set: "<all variables>".to_string(),
                expected: total,
                got: x.len(),
            });
        }

        let mut offset = 0;
        for set in &mut self.sets {
            let n = set.len();
            set.set_values(&x[offset..offset + n])?;
            offset += n;
        }
        Ok(())
    }

    /// All variable bounds stacked in insertion order
    pub fn bounds_flat(&self) -> VecBound {
        self.sets.iter().flat_map(|s| s.bounds()).collect()
    }

    /// Iterate the sets in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &dyn VariableSet> {
        self.sets.iter().map(|s| s.as_ref())
    }
}

impl std::fmt::Debug for OptimizationVariables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.sets.iter().map(|s| (s.name(), s.len())))
            .finish()
    }
}

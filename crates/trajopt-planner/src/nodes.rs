//! Planner variable sets
//!
//! - [`BaseNodes`]: position and velocity of a spline at each node
//! - [`PhaseDurations`]: contact phase durations of one end effector

use nalgebra::{DVector, Vector3};
use trajopt_core::{Bounds, NlpError, NlpResult, VariableSet, VecBound};

/// Names of the variable sets the factory registers
pub mod id {
    pub const BASE_LIN_NODES: &str = "base-lin";
    pub const BASE_ANG_NODES: &str = "base-ang";

    /// Phase durations of end effector `ee`
    pub fn ee_schedule(ee: usize) -> String {
        format!("ee-schedule-{}", ee)
    }
}

/// Derivative stored at a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeDx {
    Pos = 0,
    Vel = 1,
}

/// 3D position and velocity at each of `n` spline nodes
///
/// Layout: `node * 6 + deriv * 3 + dim`.
#[derive(Debug, Clone)]
pub struct BaseNodes {
    name: String,
    num_nodes: usize,
    values: DVector<f64>,
    bounds: VecBound,
}

impl BaseNodes {
    /// Variables per node
    pub const NODE_DIM: usize = 6;

    pub fn new(name: impl Into<String>, num_nodes: usize) -> Self {
        let len = num_nodes * Self::NODE_DIM;
        Self {
            name: name.into(),
            num_nodes,
            values: DVector::zeros(len),
            bounds: vec![Bounds::NONE; len],
        }
    }

    /// Optimization index of one scalar node value
    pub fn index(node: usize, deriv: NodeDx, dim: usize) -> usize {
        node * Self::NODE_DIM + deriv as usize * 3 + dim
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Node value read from a flat vector in this set's layout
    pub fn value_of(values: &DVector<f64>, node: usize, deriv: NodeDx) -> Vector3<f64> {
        let i = Self::index(node, deriv, 0);
        Vector3::new(values[i], values[i + 1], values[i + 2])
    }

    pub fn value(&self, node: usize, deriv: NodeDx) -> Vector3<f64> {
        Self::value_of(&self.values, node, deriv)
    }

    /// Straight line from `start` to `goal`, moving at the average velocity
    pub fn initialize_towards_goal(
        &mut self,
        start: &Vector3<f64>,
        goal: &Vector3<f64>,
        duration: f64,
    ) {
        let dp = goal - start;
        let velocity = if duration > 0.0 {
            dp / duration
        } else {
            Vector3::zeros()
        };
        let segments = self.num_nodes.saturating_sub(1).max(1) as f64;

        for node in 0..self.num_nodes {
            let position = start + dp * (node as f64 / segments);
            self.write(node, NodeDx::Pos, &position);
            self.write(node, NodeDx::Vel, &velocity);
        }
    }

    /// Pin the first node's `deriv` to `values` in the given dimensions
    pub fn add_start_bound(&mut self, deriv: NodeDx, dims: &[usize], values: &Vector3<f64>) {
        self.add_node_bound(0, deriv, dims, values);
    }

    /// Pin the last node's `deriv` to `values` in the given dimensions
    pub fn add_final_bound(&mut self, deriv: NodeDx, dims: &[usize], values: &Vector3<f64>) {
        if let Some(last) = self.num_nodes.checked_sub(1) {
            self.add_node_bound(last, deriv, dims, values);
        }
    }

    fn add_node_bound(&mut self, node: usize, deriv: NodeDx, dims: &[usize], values: &Vector3<f64>) {
        for &dim in dims {
            self.bounds[Self::index(node, deriv, dim)] = Bounds::equal(values[dim]);
        }
    }

    fn write(&mut self, node: usize, deriv: NodeDx, value: &Vector3<f64>) {
        let i = Self::index(node, deriv, 0);
        self.values.rows_mut(i, 3).copy_from(value);
    }
}

impl VariableSet for BaseNodes {
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

/// Contact phase durations of one end effector
#[derive(Debug, Clone)]
pub struct PhaseDurations {
    name: String,
    durations: DVector<f64>,
    phase_bounds: Bounds,
}

impl PhaseDurations {
    pub fn new(ee: usize, durations: &[f64], min_duration: f64, max_duration: f64) -> Self {
        Self {
            name: id::ee_schedule(ee),
            durations: DVector::from_column_slice(durations),
            phase_bounds: Bounds::new(min_duration, max_duration),
        }
    }

    pub fn durations(&self) -> &DVector<f64> {
        &self.durations
    }

    pub fn total_duration(&self) -> f64 {
        self.durations.sum()
    }
}

impl VariableSet for PhaseDurations {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.durations.len()
    }

    fn values(&self) -> DVector<f64> {
        self.durations.clone()
    }

    fn set_values(&mut self, values: &[f64]) -> NlpResult<()> {
        if values.len() != self.durations.len() {
            return Err(NlpError::DimensionMismatch {
                set: self.name.clone(),
                expected: self.durations.len(),
                got: values.len(),
            });
        }
        self.durations.copy_from_slice(values);
        Ok(())
    }

    fn bounds(&self) -> VecBound {
        vec![self.phase_bounds; self.durations.len()]
    }
}

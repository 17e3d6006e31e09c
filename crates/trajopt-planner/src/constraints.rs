//! Planner constraints
//!
//! - [`BaseMotionConstraint`]: base range of motion, sampled over time
//! - [`AccelerationContinuityConstraint`]: no base acceleration jumps at
//!   polynomial junctions
//! - [`TotalDurationConstraint`]: phase durations add up to the total time

use nalgebra::DVector;
use trajopt_core::{
    Bounds, ConstraintModel, InstanceConstraint, InstanceRows, JacobianBlocks, NlpError,
    NlpResult, TimeGrid, VariableSnapshot,
};

use crate::config::ProblemParameters;
use crate::nodes::{id, BaseNodes};
use crate::spline::{Dx, NodeSpline};

/// Keeps the base near a nominal height and level
///
/// Six rows per sample: angular xyz then linear xyz of the base position.
#[derive(Debug, Clone)]
pub struct BaseMotionConstraint {
    spline: NodeSpline,
    row_bounds: [Bounds; 6],
}

impl BaseMotionConstraint {
    /// First row of each node set inside an instance
    const ROW_BLOCKS: [(&'static str, usize); 2] =
        [(id::BASE_ANG_NODES, 0), (id::BASE_LIN_NODES, 3)];

    pub fn new(spline: NodeSpline, params: &ProblemParameters) -> Self {
        let height = Bounds::around(params.nominal_base_height, params.max_base_height_deviation);
        let tilt = Bounds::around(0.0, params.max_base_angular_deviation);
        Self {
            spline,
            row_bounds: [tilt, tilt, Bounds::NONE, Bounds::NONE, Bounds::NONE, height],
        }
    }
}

impl InstanceConstraint for BaseMotionConstraint {
    fn rows_per_instance(&self) -> usize {
        6
    }

    fn update_constraint_at_instance(
        &self,
        t: f64,
        _k: usize,
        vars: &VariableSnapshot,
        g: &mut [f64],
    ) -> NlpResult<()> {
        for (set_name, offset) in Self::ROW_BLOCKS {
            let nodes = vars.get(set_name)?;
            self.spline.check_nodes(set_name, nodes)?;
            let p = self.spline.point(nodes, t, Dx::Pos);
            g[offset..offset + 3].copy_from_slice(p.as_slice());
        }
        Ok(())
    }

    fn update_bounds_at_instance(&self, _t: f64, _k: usize, bounds: &mut [Bounds]) -> NlpResult<()> {
        bounds.copy_from_slice(&self.row_bounds);
        Ok(())
    }

    fn update_jacobian_at_instance(
        &self,
        t: f64,
        _k: usize,
        set_name: &str,
        _vars: &VariableSnapshot,
        jac: &mut InstanceRows<'_>,
    ) -> NlpResult<()> {
        let block = Self::ROW_BLOCKS.iter().find(|(name, _)| *name == set_name);
        let Some(&(_, offset)) = block else {
            return Ok(());
        };
        for c in self.spline.jacobian_wrt_nodes(t, Dx::Pos) {
            for dim in 0..3 {
                jac.add(offset + dim, BaseNodes::index(c.node, c.deriv, dim), c.coefficient);
            }
        }
        Ok(())
    }
}

/// Equal base acceleration just before and just after every junction
///
/// Samples the base linear spline on [`TimeGrid::polynomial_junctions`];
/// three rows per junction, `a(tᵢ + ε) - a(tᵢ - ε) = 0`.
#[derive(Debug, Clone)]
pub struct AccelerationContinuityConstraint {
    spline: NodeSpline,
    grid: TimeGrid,
}

impl AccelerationContinuityConstraint {
    pub fn new(spline: NodeSpline, junction_offset: f64) -> NlpResult<Self> {
        let grid = TimeGrid::polynomial_junctions(spline.durations(), junction_offset)?;
        Ok(Self { spline, grid })
    }

    pub fn num_junctions(&self) -> usize {
        self.spline.durations().len() - 1
    }

    pub fn num_rows(&self) -> usize {
        3 * self.num_junctions()
    }

    /// Sample times just before and just after junction `j`
    fn junction_times(&self, j: usize) -> (f64, f64) {
        let times = self.grid.times();
        (times[2 * j + 1], times[2 * j + 2])
    }
}

impl ConstraintModel for AccelerationContinuityConstraint {
    fn compute_residual(&self, vars: &VariableSnapshot, g: &mut DVector<f64>) -> NlpResult<()> {
        let nodes = vars.get(id::BASE_LIN_NODES)?;
        self.spline.check_nodes(id::BASE_LIN_NODES, nodes)?;

        for j in 0..self.num_junctions() {
            let (before, after) = self.junction_times(j);
            let jump = self.spline.point(nodes, after, Dx::Acc)
                - self.spline.point(nodes, before, Dx::Acc);
            g.rows_mut(3 * j, 3).copy_from(&jump);
        }
        Ok(())
    }

    fn compute_bounds(&self, bounds: &mut [Bounds]) -> NlpResult<()> {
        bounds.fill(Bounds::ZERO);
        Ok(())
    }

    fn compute_jacobians(
        &self,
        _vars: &VariableSnapshot,
        blocks: &mut JacobianBlocks,
    ) -> NlpResult<()> {
        let jac = blocks.get_mut(id::BASE_LIN_NODES)?;
        for j in 0..self.num_junctions() {
            let (before, after) = self.junction_times(j);
            let terms = [(after, 1.0), (before, -1.0)];
            for (t, sign) in terms {
                for c in self.spline.jacobian_wrt_nodes(t, Dx::Acc) {
                    for dim in 0..3 {
                        let col = BaseNodes::index(c.node, c.deriv, dim);
                        jac.add(3 * j + dim, col, sign * c.coefficient);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Sum of one end effector's phase durations equals the total duration
#[derive(Debug, Clone)]
pub struct TotalDurationConstraint {
    set_name: String,
    total_duration: f64,
}

impl TotalDurationConstraint {
    pub fn new(ee: usize, total_duration: f64) -> NlpResult<Self> {
        if !total_duration.is_finite() || total_duration <= 0.0 {
            return Err(NlpError::InvalidConfig(format!(
                "total duration must be positive, got {}",
                total_duration
            )));
        }
        Ok(Self {
            set_name: id::ee_schedule(ee),
            total_duration,
        })
    }

    pub fn set_name(&self) -> &str {
        &self.set_name
    }
}

impl ConstraintModel for TotalDurationConstraint {
    fn compute_residual(&self, vars: &VariableSnapshot, g: &mut DVector<f64>) -> NlpResult<()> {
        g[0] = vars.get(&self.set_name)?.sum();
        Ok(())
    }

    fn compute_bounds(&self, bounds: &mut [Bounds]) -> NlpResult<()> {
        bounds[0] = Bounds::equal(self.total_duration);
        Ok(())
    }

    fn compute_jacobians(
        &self,
        _vars: &VariableSnapshot,
        blocks: &mut JacobianBlocks,
    ) -> NlpResult<()> {
        let jac = blocks.get_mut(&self.set_name)?;
        for col in 0..jac.ncols() {
            jac.set(0, col, 1.0);
        }
        Ok(())
    }
}

//! Constraint contract
//!
//! A constraint `g(x)` with bounds `lower ≤ g(x) ≤ upper` is split in two:
//!
//! - [`ConstraintModel`]: the per-constraint math (residual, bounds and,
//!   optionally, Jacobians). This is all a concrete constraint implements.
//! - [`Constraint`]: the shared bookkeeping. It owns the residual vector, the
//!   bounds, the dependent-variable registry with its Jacobian blocks, and
//!   enforces their shapes.
//!
//! The solver side talks to any constraint through the object-safe
//! [`ConstraintSet`] trait.
//!
//! # Evaluation order
//!
//! ```text
//! build:    subscribe(set)*  →  initialize(vars)
//!           (bounds computed and validated, constant Jacobians filled)
//! iterate:  refresh_from_variables(vars)
//!           (snapshot pulled, residual and recomputed Jacobians filled)
//!           residual() / bounds() / jacobian_block(set)
//! ```

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::bounds::{validate_bounds, Bounds, VecBound};
use crate::dependent::{DependentVariables, JacobianBlocks, VariableSnapshot};
use crate::error::{NlpError, NlpResult};
use crate::sparse::Jacobian;
use crate::variables::{OptimizationVariables, VariableHandle};

/// Whether the Jacobian blocks depend on the current iterate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JacobianKind {
    /// Filled once during initialization and cached afterwards
    Constant,
    /// Reset and refilled on every refresh
    Recomputed,
}

/// Per-constraint math
pub trait ConstraintModel: Send {
    /// Fill `g` (already sized to the residual dimension) from the snapshot
    fn compute_residual(&self, vars: &VariableSnapshot, g: &mut DVector<f64>) -> NlpResult<()>;

    /// Fill one bound per residual row
    fn compute_bounds(&self, bounds: &mut [Bounds]) -> NlpResult<()>;

    /// Fill the Jacobian blocks; blocks start out zero
    ///
    /// The default leaves every block at zero.
    fn compute_jacobians(
        &self,
        _vars: &VariableSnapshot,
        _blocks: &mut JacobianBlocks,
    ) -> NlpResult<()> {
        Ok(())
    }
}

/// Satisfaction of a single residual row
#[derive(Debug, Clone, PartialEq)]
pub struct RowStatus {
    pub row: usize,
    pub value: f64,
    pub bounds: Bounds,
    /// Distance outside the bounds (0 if inside)
    pub violation: f64,
    pub satisfied: bool,
}

/// Row-wise feasibility of one constraint
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub name: String,
    pub tolerance: f64,
    pub rows: Vec<RowStatus>,
}

impl StatusReport {
    /// Classify every row of `values` against `bounds`
    pub fn new(name: &str, values: &DVector<f64>, bounds: &[Bounds], tolerance: f64) -> Self {
        let rows = values
            .iter()
            .zip(bounds.iter())
            .enumerate()
            .map(|(row, (&value, &bounds))| {
                let violation = bounds.violation(value);
                RowStatus {
                    row,
                    value,
                    bounds,
                    violation,
                    satisfied: violation <= tolerance,
                }
            })
            .collect();

        Self {
            name: name.to_string(),
            tolerance,
            rows,
        }
    }

    pub fn num_violated(&self) -> usize {
        self.rows.iter().filter(|r| !r.satisfied).count()
    }

    pub fn all_satisfied(&self) -> bool {
        self.rows.iter().all(|r| r.satisfied)
    }

    /// Largest violation over all rows (0 if none)
    pub fn max_violation(&self) -> f64 {
        self.rows.iter().map(|r| r.violation).fold(0.0, f64::max)
    }

    pub fn violated(&self) -> impl Iterator<Item = &RowStatus> {
        self.rows.iter().filter(|r| !r.satisfied)
    }

    /// Emit the report through `tracing`
    pub fn log(&self) {
        tracing::info!(
            constraint = %self.name,
            rows = self.rows.len(),
            violated = self.num_violated(),
            max_violation = self.max_violation(),
            "constraint status"
        );
        for row in self.violated() {
            tracing::warn!(
                constraint = %self.name,
                row = row.row,
                value = row.value,
                lower = row.bounds.lower,
                upper = row.bounds.upper,
                "row violated"
            );
        }
    }
}

/// Interface the NLP driver uses for every constraint and cost
pub trait ConstraintSet: Send {
    fn name(&self) -> &str;

    /// Residual dimension
    fn num_constraints(&self) -> usize;

    fn jacobian_kind(&self) -> JacobianKind;

    /// Dependent set names in subscription order
    fn dependencies(&self) -> Vec<&str>;

    /// Pull the current iterate and recompute residual (and Jacobians if
    /// they are not constant). Must precede every read in an iteration.
    fn refresh_from_variables(&mut self, variables: &OptimizationVariables) -> NlpResult<()>;

    /// Residual as of the last refresh
    fn residual(&self) -> &DVector<f64>;

    /// One bound per residual row
    fn bounds(&self) -> &[Bounds];

    /// ∂g/∂x for the named dependent set, `(num_constraints, dim)`
    fn jacobian_block(&self, set_name: &str) -> NlpResult<&Jacobian>;

    /// Classify every row and log the result
    fn report_status(&self, tolerance: f64) -> StatusReport {
        let report = StatusReport::new(self.name(), self.residual(), self.bounds(), tolerance);
        report.log();
        report
    }
}

/// Bookkeeping wrapper around a [`ConstraintModel`]
#[derive(Debug, Clone)]
pub struct Constraint<M> {
    name: String,
    model: M,
    residual: DVector<f64>,
    bounds: VecBound,
    variables: DependentVariables,
    jacobian_kind: JacobianKind,
    initialized: bool,
}

impl<M: ConstraintModel> Constraint<M> {
    /// Constraint with a fixed residual dimension and no dependencies yet
    pub fn new(
        name: impl Into<String>,
        num_constraints: usize,
        model: M,
        jacobian_kind: JacobianKind,
    ) -> Self {
        Self {
            name: name.into(),
            model,
            residual: DVector::zeros(num_constraints),
            bounds: vec![Bounds::NONE; num_constraints],
            variables: DependentVariables::new(num_constraints),
            jacobian_kind,
            initialized: false,
        }
    }

    /// Subscribe to `dependencies` and initialize against `variables`
    pub fn build(
        name: impl Into<String>,
        num_constraints: usize,
        model: M,
        jacobian_kind: JacobianKind,
        dependencies: &[VariableHandle],
        variables: &OptimizationVariables,
    ) -> NlpResult<Self> {
        let mut constraint = Self::new(name, num_constraints, model, jacobian_kind);
        for handle in dependencies {
            constraint.subscribe(handle)?;
        }
        constraint.initialize(variables)?;
        Ok(constraint)
    }

    /// Declare a dependency on a variable set
    pub fn subscribe(&mut self, handle: &VariableHandle) -> NlpResult<()> {
        if self.initialized {
            return Err(NlpError::InvariantViolation(format!(
                "{}: dependencies are fixed after initialization",
                self.name
            )));
        }
        let rows = self.residual.len();
        self.variables.subscribe(handle, rows)
    }

    /// Compute and validate bounds, fill constant Jacobians, then refresh
    pub fn initialize(&mut self, variables: &OptimizationVariables) -> NlpResult<()> {
        let mut bounds = vec![Bounds::NONE; self.residual.len()];
        self.model.compute_bounds(&mut bounds)?;
        validate_bounds(&bounds)?;
        self.bounds = bounds;

        self.variables.refresh(variables)?;
        if self.jacobian_kind == JacobianKind::Constant {
            self.fill_jacobians()?;
        }

        self.initialized = true;
        tracing::debug!(
            constraint = %self.name,
            rows = self.residual.len(),
            dependencies = self.variables.len(),
            kind = ?self.jacobian_kind,
            "initialized constraint"
        );
        self.refresh_from_variables(variables)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Dependent-variable registry, including the last snapshot
    pub fn variables(&self) -> &DependentVariables {
        &self.variables
    }

    fn fill_jacobians(&mut self) -> NlpResult<()> {
        let (snapshot, blocks) = self.variables.split_mut();
        blocks.clear();
        self.model.compute_jacobians(snapshot, blocks)
    }

    fn check_invariants(&self) -> NlpResult<()> {
        let rows = self.variables.num_rows();
        if self.residual.len() != rows || self.bounds.len() != rows {
            return Err(NlpError::InvariantViolation(format!(
                "{}: residual has {} rows, bounds {}, expected {}",
                self.name,
                self.residual.len(),
                self.bounds.len(),
                rows
            )));
        }
        self.variables.check_shapes()
    }
}

impl<M: ConstraintModel> ConstraintSet for Constraint<M> {
    fn name(&self) -> &str {
        &self.name
    }

    fn num_constraints(&self) -> usize {
        self.variables.num_rows()
    }

    fn jacobian_kind(&self) -> JacobianKind {
        self.jacobian_kind
    }

    fn dependencies(&self) -> Vec<&str> {
        self.variables.names()
    }

    fn refresh_from_variables(&mut self, variables: &OptimizationVariables) -> NlpResult<()> {
        if !self.initialized {
            return Err(NlpError::InvariantViolation(format!(
                "{}: refreshed before initialization",
                self.name
            )));
        }

        self.variables.refresh(variables)?;

        self.residual.fill(0.0);
        self.model
            .compute_residual(self.variables.snapshot(), &mut self.residual)?;

        if self.jacobian_kind == JacobianKind::Recomputed {
            self.fill_jacobians()?;
        }

        self.check_invariants()
    }

    fn residual(&self) -> &DVector<f64> {
        &self.residual
    }

    fn bounds(&self) -> &[Bounds] {
        &self.bounds
    }

    fn jacobian_block(&self, set_name: &str) -> NlpResult<&Jacobian> {
        self.variables.jacobian(set_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::VectorVariables;

    /// g = [x0 + x1, x2 * x3], constant Jacobian left at its default
    struct SumProduct;

    impl ConstraintModel for SumProduct {
        fn compute_residual(&self, vars: &VariableSnapshot, g: &mut DVector<f64>) -> NlpResult<()> {
            let x = vars.get("x")?;
            g[0] = x[0] + x[1];
            g[1] = x[2] * x[3];
            Ok(())
        }

        fn compute_bounds(&self, bounds: &mut [Bounds]) -> NlpResult<()> {
            bounds[0] = Bounds::new(0.0, 4.0);
            bounds[1] = Bounds::ZERO;
            Ok(())
        }
    }

    /// Same residual with an exact Jacobian that depends on x
    struct SumProductExact;

    impl ConstraintModel for SumProductExact {
        fn compute_residual(&self, vars: &VariableSnapshot, g: &mut DVector<f64>) -> NlpResult<()> {
            SumProduct.compute_residual(vars, g)
        }

        fn compute_bounds(&self, bounds: &mut [Bounds]) -> NlpResult<()> {
            SumProduct.compute_bounds(bounds)
        }

        fn compute_jacobians(
            &self,
            vars: &VariableSnapshot,
            blocks: &mut JacobianBlocks,
        ) -> NlpResult<()> {
            let x = vars.get("x")?;
            let jac = blocks.get_mut("x")?;
            jac.set(0, 0, 1.0);
            jac.set(0, 1, 1.0);
            jac.set(1, 2, x[3]);
            jac.set(1, 3, x[2]);
            Ok(())
        }
    }

    struct InvertedBounds;

    impl ConstraintModel for InvertedBounds {
        fn compute_residual(&self, _: &VariableSnapshot, _: &mut DVector<f64>) -> NlpResult<()> {
            Ok(())
        }

        fn compute_bounds(&self, bounds: &mut [Bounds]) -> NlpResult<()> {
            bounds[0] = Bounds::new(1.0, -1.0);
            Ok(())
        }
    }

    fn create_test_variables() -> OptimizationVariables {
        let mut vars = OptimizationVariables::new();
        vars.add(VectorVariables::new("x", DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0])))
            .unwrap();
        vars
    }

    #[test]
    fn test_constant_jacobian_defaults_to_zero() {
        let mut vars = create_test_variables();
        let handle = vars.handle("x").unwrap();
        let mut c = Constraint::build(
            "sum-product",
            2,
            SumProduct,
            JacobianKind::Constant,
            &[handle],
            &vars,
        )
        .unwrap();

        let jac = c.jacobian_block("x").unwrap().clone();
        assert_eq!(jac.shape(), (2, 4));
        assert!(jac.is_zero());

        for i in 0..3 {
            vars.set_values("x", &[i as f64, 1.0, 2.0, 3.0]).unwrap();
            c.refresh_from_variables(&vars).unwrap();
            assert_eq!(c.jacobian_block("x").unwrap(), &jac);
        }
    }

    #[test]
    fn test_residual_and_bounds() {
        let vars = create_test_variables();
        let c = Constraint::build(
            "sum-product",
            2,
            SumProduct,
            JacobianKind::Constant,
            &[vars.handle("x").unwrap()],
            &vars,
        )
        .unwrap();

        assert_eq!(c.num_constraints(), 2);
        assert_eq!(c.residual().as_slice(), &[3.0, 12.0]);
        assert_eq!(c.bounds(), &[Bounds::new(0.0, 4.0), Bounds::ZERO]);
        assert_eq!(c.dependencies(), vec!["x"]);
    }

    #[test]
    fn test_recomputed_jacobian_tracks_iterate() {
        let mut vars = create_test_variables();
        let mut c = Constraint::build(
            "exact",
            2,
            SumProductExact,
            JacobianKind::Recomputed,
            &[vars.handle("x").unwrap()],
            &vars,
        )
        .unwrap();
        assert_eq!(c.jacobian_block("x").unwrap().get(1, 2), 4.0);

        vars.set_values("x", &[0.0, 0.0, 5.0, 7.0]).unwrap();
        c.refresh_from_variables(&vars).unwrap();
        let jac = c.jacobian_block("x").unwrap();
        assert_eq!(jac.get(1, 2), 7.0);
        assert_eq!(jac.get(1, 3), 5.0);
        assert_eq!(c.residual()[1], 35.0);
    }

    #[test]
    fn test_reads_are_idempotent() {
        let vars = create_test_variables();
        let c = Constraint::build(
            "exact",
            2,
            SumProductExact,
            JacobianKind::Recomputed,
            &[vars.handle("x").unwrap()],
            &vars,
        )
        .unwrap();

        assert_eq!(c.residual(), c.residual());
        assert_eq!(c.bounds(), c.bounds());
        assert_eq!(c.jacobian_block("x").unwrap(), c.jacobian_block("x").unwrap());
    }

    #[test]
    fn test_unknown_block() {
        let vars = create_test_variables();
        let c = Constraint::build(
            "sum-product",
            2,
            SumProduct,
            JacobianKind::Constant,
            &[vars.handle("x").unwrap()],
            &vars,
        )
        .unwrap();

        assert_eq!(
            c.jacobian_block("unknown").unwrap_err(),
            NlpError::UnknownVariableSet("unknown".to_string())
        );
    }

    #[test]
    fn test_duplicate_subscription() {
        let vars = create_test_variables();
        let handle = vars.handle("x").unwrap();
        let mut c = Constraint::new("dup", 2, SumProduct, JacobianKind::Constant);
        c.subscribe(&handle).unwrap();
        assert_eq!(
            c.subscribe(&handle).unwrap_err(),
            NlpError::DuplicateDependency("x".to_string())
        );
        assert_eq!(c.dependencies(), vec!["x"]);
    }

    #[test]
    fn test_inverted_bounds_are_fatal() {
        let vars = create_test_variables();
        let result = Constraint::build(
            "inverted",
            1,
            InvertedBounds,
            JacobianKind::Constant,
            &[],
            &vars,
        );
        assert!(matches!(result, Err(NlpError::InvalidBound { row: 0, .. })));
    }

    #[test]
    fn test_refresh_before_initialize_fails() {
        let vars = create_test_variables();
        let mut c = Constraint::new("early", 2, SumProduct, JacobianKind::Constant);
        c.subscribe(&vars.handle("x").unwrap()).unwrap();
        assert!(matches!(
            c.refresh_from_variables(&vars),
            Err(NlpError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_subscribe_after_initialize_fails() {
        let mut vars = create_test_variables();
        vars.add(VectorVariables::zeros("y", 1)).unwrap();
        let mut c = Constraint::build(
            "late",
            2,
            SumProduct,
            JacobianKind::Constant,
            &[vars.handle("x").unwrap()],
            &vars,
        )
        .unwrap();
        assert!(c.subscribe(&vars.handle("y").unwrap()).is_err());
        assert_eq!(c.dependencies(), vec!["x"]);
    }

    #[test]
    fn test_report_status() {
        let vars = create_test_variables();
        let c = Constraint::build(
            "sum-product",
            2,
            SumProduct,
            JacobianKind::Constant,
            &[vars.handle("x").unwrap()],
            &vars,
        )
        .unwrap();

        // g = [3, 12], bounds [0, 4] and [0, 0]
        let report = c.report_status(1e-6);
        assert_eq!(report.rows.len(), 2);
        assert!(report.rows[0].satisfied);
        assert!(!report.rows[1].satisfied);
        assert_eq!(report.num_violated(), 1);
        assert!((report.max_violation() - 12.0).abs() < 1e-12);

        let loose = c.report_status(20.0);
        assert!(loose.all_satisfied());
    }

    #[test]
    fn test_nan_row_is_violated() {
        let values = DVector::from_vec(vec![f64::NAN, 0.0]);
        let report = StatusReport::new("c", &values, &[Bounds::ZERO, Bounds::NONE], 1e-6);

        assert!(!report.rows[0].satisfied);
        assert_eq!(report.rows[0].violation, f64::INFINITY);
        assert!(report.rows[1].satisfied);
        assert_eq!(report.num_violated(), 1);
        assert_eq!(report.max_violation(), f64::INFINITY);
    }
}

//! Cost terms
//!
//! A cost is a constraint with a single, unbounded residual row: the row
//! value is the cost and its Jacobian blocks are the gradient (as `1 × n`
//! rows) w.r.t. each dependent variable set. [`Cost`] reuses the
//! [`Constraint`] bookkeeping for exactly that.

use nalgebra::DVector;

use crate::bounds::Bounds;
use crate::constraint::{Constraint, ConstraintModel, ConstraintSet, JacobianKind};
use crate::dependent::{JacobianBlocks, VariableSnapshot};
use crate::error::NlpResult;
use crate::sparse::Jacobian;
use crate::variables::{OptimizationVariables, VariableHandle};

/// Per-cost math
pub trait CostModel: Send {
    /// Scalar cost at the snapshot
    fn cost(&self, vars: &VariableSnapshot) -> NlpResult<f64>;

    /// Fill the `1 × dim(set)` gradient row w.r.t. `set_name`
    fn fill_gradient(
        &self,
        vars: &VariableSnapshot,
        set_name: &str,
        gradient: &mut Jacobian,
    ) -> NlpResult<()>;
}

#[derive(Debug, Clone)]
struct CostAdapter<M>(M);

impl<M: CostModel> ConstraintModel for CostAdapter<M> {
    fn compute_residual(&self, vars: &VariableSnapshot, g: &mut DVector<f64>) -> NlpResult<()> {
        g[0] = self.0.cost(vars)?;
        Ok(())
    }

    fn compute_bounds(&self, bounds: &mut [Bounds]) -> NlpResult<()> {
        bounds[0] = Bounds::NONE;
        Ok(())
    }

    fn compute_jacobians(
        &self,
        vars: &VariableSnapshot,
        blocks: &mut JacobianBlocks,
    ) -> NlpResult<()> {
        for (name, gradient) in blocks.iter_mut() {
            self.0.fill_gradient(vars, name, gradient)?;
        }
        Ok(())
    }
}

/// A [`ConstraintSet`] whose single row is a cost to be minimized
pub trait CostTerm: ConstraintSet {
    /// Cost as of the last refresh
    fn cost(&self) -> f64 {
        self.residual()[0]
    }
}

/// Bookkeeping wrapper around a [`CostModel`]
#[derive(Debug, Clone)]
pub struct Cost<M> {
    inner: Constraint<CostAdapter<M>>,
}

impl<M: CostModel> Cost<M> {
    /// Cost whose gradient is refilled on every refresh
    pub fn new(name: impl Into<String>, model: M) -> Self {
        Self {
            inner: Constraint::new(name, 1, CostAdapter(model), JacobianKind::Recomputed),
        }
    }

    /// Subscribe to `dependencies` and initialize against `variables`
    pub fn build(
        name: impl Into<String>,
        model: M,
        dependencies: &[VariableHandle],
        variables: &OptimizationVariables,
    ) -> NlpResult<Self> {
        let mut cost = Self::new(name, model);
        for handle in dependencies {
            cost.subscribe(handle)?;
        }
        cost.initialize(variables)?;
        Ok(cost)
    }

    pub fn subscribe(&mut self, handle: &VariableHandle) -> NlpResult<()> {
        self.inner.subscribe(handle)
    }

    pub fn initialize(&mut self, variables: &OptimizationVariables) -> NlpResult<()> {
        self.inner.initialize(variables)
    }

    pub fn model(&self) -> &M {
        &self.inner.model().0
    }

    /// Gradient row w.r.t. the named set
    pub fn gradient(&self, set_name: &str) -> NlpResult<&Jacobian> {
        self.inner.jacobian_block(set_name)
    }
}

impl<M: CostModel> ConstraintSet for Cost<M> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn num_constraints(&self) -> usize {
        1
    }

    fn jacobian_kind(&self) -> JacobianKind {
        self.inner.jacobian_kind()
    }

    fn dependencies(&self) -> Vec<&str> {
        self.inner.dependencies()
    }

    fn refresh_from_variables(&mut self, variables: &OptimizationVariables) -> NlpResult<()> {
        self.inner.refresh_from_variables(variables)
    }

    fn residual(&self) -> &DVector<f64> {
        self.inner.residual()
    }

    fn bounds(&self) -> &[Bounds] {
        self.inner.bounds()
    }

    fn jacobian_block(&self, set_name: &str) -> NlpResult<&Jacobian> {
        self.inner.jacobian_block(set_name)
    }
}

impl<M: CostModel> CostTerm for Cost<M> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::VectorVariables;
    use approx::assert_relative_eq;

    /// weight * Σ xᵢ²
    struct SquaredNorm {
        weight: f64,
    }

    impl CostModel for SquaredNorm {
        fn cost(&self, vars: &VariableSnapshot) -> NlpResult<f64> {
            Ok(self.weight * vars.get("x")?.norm_squared())
        }

        fn fill_gradient(
            &self,
            vars: &VariableSnapshot,
            set_name: &str,
            gradient: &mut Jacobian,
        ) -> NlpResult<()> {
            let x = vars.get(set_name)?;
            for (i, xi) in x.iter().enumerate() {
                gradient.set(0, i, 2.0 * self.weight * xi);
            }
            Ok(())
        }
    }

    #[test]
    fn test_cost_value_and_gradient() {
        let mut vars = OptimizationVariables::new();
        vars.add(VectorVariables::new("x", DVector::from_vec(vec![1.0, -2.0])))
            .unwrap();

        let mut cost = Cost::build(
            "norm",
            SquaredNorm { weight: 0.5 },
            &[vars.handle("x").unwrap()],
            &vars,
        )
        .unwrap();

        assert_relative_eq!(cost.cost(), 2.5);
        let grad = cost.gradient("x").unwrap();
        assert_eq!(grad.shape(), (1, 2));
        assert_relative_eq!(grad.get(0, 1), -2.0);

        vars.set_values("x", &[3.0, 0.0]).unwrap();
        cost.refresh_from_variables(&vars).unwrap();
        assert_relative_eq!(cost.cost(), 4.5);
        assert_relative_eq!(cost.gradient("x").unwrap().get(0, 0), 3.0);
        assert_relative_eq!(cost.gradient("x").unwrap().get(0, 1), 0.0);
    }

    #[test]
    fn test_cost_is_unbounded() {
        let mut vars = OptimizationVariables::new();
        vars.add(VectorVariables::zeros("x", 3)).unwrap();
        let cost = Cost::build(
            "norm",
            SquaredNorm { weight: 1.0 },
            &[vars.handle("x").unwrap()],
            &vars,
        )
        .unwrap();

        assert_eq!(cost.num_constraints(), 1);
        assert_eq!(cost.bounds(), &[Bounds::NONE]);
        assert_eq!(cost.jacobian_kind(), JacobianKind::Recomputed);
        assert!(cost.report_status(0.0).all_satisfied());
    }
}

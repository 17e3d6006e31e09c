//! NLP assembly
//!
//! [`Nlp`] is what a solver talks to. It owns the variables, constraint sets
//! and cost terms of one problem and stacks their per-set pieces into global
//! quantities:
//!
//! ```text
//! x   = [ set_0 ; set_1 ; … ]                 (insertion order)
//! g   = [ g_0 ; g_1 ; … ]                     (constraint order)
//! J   = ∂g/∂x, block (i, s) at rows of g_i, columns of set s
//! ∇f  = Σⱼ ∂cⱼ/∂x
//! ```
//!
//! Every write of the iterate refreshes all constraints and costs before
//! anything is read back.

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use trajopt_core::{
    ConstraintSet, CostTerm, NlpResult, OptimizationVariables, StatusReport, VecBound,
};

/// Variables, constraints and costs of one problem
pub struct Nlp {
    variables: OptimizationVariables,
    constraints: Vec<Box<dyn ConstraintSet>>,
    costs: Vec<Box<dyn CostTerm>>,
}

impl Nlp {
    pub fn new(variables: OptimizationVariables) -> Self {
        Self {
            variables,
            constraints: Vec::new(),
            costs: Vec::new(),
        }
    }

    pub fn add_constraint(&mut self, constraint: Box<dyn ConstraintSet>) {
        tracing::debug!(
            constraint = constraint.name(),
            rows = constraint.num_constraints(),
            "added constraint"
        );
        self.constraints.push(constraint);
    }

    pub fn add_cost(&mut self, cost: Box<dyn CostTerm>) {
        tracing::debug!(cost = cost.name(), "added cost");
        self.costs.push(cost);
    }

    pub fn variables(&self) -> &OptimizationVariables {
        &self.variables
    }

    pub fn constraints(&self) -> impl Iterator<Item = &dyn ConstraintSet> {
        self.constraints.iter().map(|c| c.as_ref())
    }

    pub fn costs(&self) -> impl Iterator<Item = &dyn CostTerm> {
        self.costs.iter().map(|c| c.as_ref())
    }

    pub fn num_variables(&self) -> usize {
        self.variables.total_len()
    }

    /// Total residual dimension over all constraints
    pub fn num_constraints(&self) -> usize {
        self.constraints.iter().map(|c| c.num_constraints()).sum()
    }

    pub fn variable_values(&self) -> DVector<f64> {
        self.variables.values_flat()
    }

    pub fn variable_bounds(&self) -> VecBound {
        self.variables.bounds_flat()
    }

    /// Write a new iterate and refresh every constraint and cost
    pub fn set_variables(&mut self, x: &[f64]) -> NlpResult<()> {
        self.variables.set_values_flat(x)?;
        self.refresh()
    }

    /// Pull the current iterate into every constraint and cost
    pub fn refresh(&mut self) -> NlpResult<()> {
        let variables = &self.variables;
        for constraint in &mut self.constraints {
            constraint.refresh_from_variables(variables)?;
        }
        for cost in &mut self.costs {
            cost.refresh_from_variables(variables)?;
        }
        Ok(())
    }

    /// Stacked residuals
    pub fn constraint_values(&self) -> DVector<f64> {
        let mut g = Vec::with_capacity(self.num_constraints());
        for constraint in &self.constraints {
            g.extend(constraint.residual().iter());
        }
        DVector::from_vec(g)
    }

    /// Stacked row bounds
    pub fn constraint_bounds(&self) -> VecBound {
        self.constraints
            .iter()
            .flat_map(|c| c.bounds().iter().copied())
            .collect()
    }

    /// Global constraint Jacobian, `num_constraints × num_variables`
    pub fn jacobian(&self) -> NlpResult<CsrMatrix<f64>> {
        let mut coo = CooMatrix::new(self.num_constraints(), self.num_variables());
        let mut row = 0;
        for constraint in &self.constraints {
            for set_name in constraint.dependencies() {
                let col = self.variables.offset(set_name)?;
                constraint.jacobian_block(set_name)?.append_to(&mut coo, row, col);
            }
            row += constraint.num_constraints();
        }
        tracing::debug!(
            rows = coo.nrows(),
            cols = coo.ncols(),
            nnz = coo.nnz(),
            "assembled constraint jacobian"
        );
        Ok(CsrMatrix::from(&coo))
    }

    /// Sum of all cost terms
    pub fn cost(&self) -> f64 {
        self.costs.iter().map(|c| c.cost()).sum()
    }

    /// Gradient of the total cost w.r.t. the stacked variables
    pub fn cost_gradient(&self) -> NlpResult<DVector<f64>> {
        let mut gradient = DVector::zeros(self.num_variables());
        for cost in &self.costs {
            for set_name in cost.dependencies() {
                let offset = self.variables.offset(set_name)?;
                for (_, col, val) in cost.jacobian_block(set_name)?.triplets() {
                    gradient[offset + col] += val;
                }
            }
        }
        Ok(gradient)
    }

    /// Log and return the row-wise status of every constraint
    pub fn print_status(&self, tolerance: f64) -> Vec<StatusReport> {
        tracing::info!(
            variables = self.num_variables(),
            constraints = self.num_constraints(),
            cost = self.cost(),
            "problem status"
        );
        self.constraints
            .iter()
            .map(|c| c.report_status(tolerance))
            .collect()
    }
}

impl std::fmt::Debug for Nlp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Nlp")
            .field("variables", &self.variables)
            .field(
                "constraints",
                &self.constraints.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field("costs", &self.costs.iter().map(|c| c.name()).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use trajopt_core::{
        Bounds, Constraint, ConstraintModel, Cost, CostModel, Jacobian, JacobianBlocks,
        JacobianKind, VariableSnapshot, VectorVariables,
    };

    /// g = a₀ + 2·b₁
    struct Linear;

    impl ConstraintModel for Linear {
        fn compute_residual(&self, vars: &VariableSnapshot, g: &mut DVector<f64>) -> NlpResult<()> {
            g[0] = vars.get("a")?[0] + 2.0 * vars.get("b")?[1];
            Ok(())
        }

        fn compute_bounds(&self, bounds: &mut [Bounds]) -> NlpResult<()> {
            bounds[0] = Bounds::equal(1.0);
            Ok(())
        }

        fn compute_jacobians(
            &self,
            _vars: &VariableSnapshot,
            blocks: &mut JacobianBlocks,
        ) -> NlpResult<()> {
            blocks.get_mut("a")?.set(0, 0, 1.0);
            blocks.get_mut("b")?.set(0, 1, 2.0);
            Ok(())
        }
    }

    /// Σ b²
    struct Squares;

    impl CostModel for Squares {
        fn cost(&self, vars: &VariableSnapshot) -> NlpResult<f64> {
            Ok(vars.get("b")?.norm_squared())
        }

        fn fill_gradient(
            &self,
            vars: &VariableSnapshot,
            set_name: &str,
            gradient: &mut Jacobian,
        ) -> NlpResult<()> {
            for (i, v) in vars.get(set_name)?.iter().enumerate() {
                gradient.set(0, i, 2.0 * v);
            }
            Ok(())
        }
    }

    fn create_test_nlp() -> Nlp {
        let mut vars = OptimizationVariables::new();
        let a = vars.add(VectorVariables::zeros("a", 2)).unwrap();
        let b = vars.add(VectorVariables::zeros("b", 3)).unwrap();

        // subscribed in the opposite order of registration
        let c = Constraint::build("lin", 1, Linear, JacobianKind::Constant, &[b.clone(), a], &vars)
            .unwrap();
        let f = Cost::build("squares", Squares, &[b], &vars).unwrap();

        let mut nlp = Nlp::new(vars);
        nlp.add_constraint(Box::new(c));
        nlp.add_cost(Box::new(f));
        nlp
    }

    #[test]
    fn test_dimensions() {
        let nlp = create_test_nlp();
        assert_eq!(nlp.num_variables(), 5);
        assert_eq!(nlp.num_constraints(), 1);
        assert_eq!(nlp.constraint_bounds(), vec![Bounds::equal(1.0)]);
    }

    #[test]
    fn test_set_variables_refreshes_everything() {
        let mut nlp = create_test_nlp();
        nlp.set_variables(&[3.0, 0.0, 1.0, 2.0, 0.5]).unwrap();

        assert_relative_eq!(nlp.constraint_values()[0], 7.0);
        assert_relative_eq!(nlp.cost(), 5.25);
        let grad = nlp.cost_gradient().unwrap();
        assert_eq!(grad.as_slice(), &[0.0, 0.0, 2.0, 4.0, 1.0]);
        assert_eq!(nlp.variable_values()[3], 2.0);
    }

    #[test]
    fn test_global_jacobian_uses_set_offsets() {
        let nlp = create_test_nlp();
        let jac = nlp.jacobian().unwrap();
        assert_eq!((jac.nrows(), jac.ncols()), (1, 5));
        assert_eq!(jac.nnz(), 2);

        let dense = nalgebra::DMatrix::from(&jac);
        assert_relative_eq!(dense[(0, 0)], 1.0);
        assert_relative_eq!(dense[(0, 3)], 2.0);
    }

    #[test]
    fn test_wrong_length_iterate() {
        let mut nlp = create_test_nlp();
        assert!(nlp.set_variables(&[1.0; 4]).is_err());
        assert_relative_eq!(nlp.constraint_values()[0], 0.0);
    }

    #[test]
    fn test_print_status() {
        let mut nlp = create_test_nlp();
        let reports = nlp.print_status(1e-6);
        assert_eq!(reports.len(), 1);
        assert!(!reports[0].all_satisfied());

        nlp.set_variables(&[1.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        assert!(nlp.print_status(1e-6)[0].all_satisfied());
    }
}

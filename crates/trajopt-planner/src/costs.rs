//! Planner costs

use trajopt_core::{CostModel, Jacobian, NlpResult, VariableSnapshot};

use crate::nodes::{BaseNodes, NodeDx};

/// `weight · Σₙ x(n, deriv, dim)²` over all nodes of one set
#[derive(Debug, Clone)]
pub struct NodeCost {
    set_name: String,
    deriv: NodeDx,
    dim: usize,
    weight: f64,
}

impl NodeCost {
    pub fn new(set_name: impl Into<String>, deriv: NodeDx, dim: usize, weight: f64) -> Self {
        Self {
            set_name: set_name.into(),
            deriv,
            dim,
            weight,
        }
    }

    pub fn set_name(&self) -> &str {
        &self.set_name
    }

    fn indices(&self, len: usize) -> impl Iterator<Item = usize> + '_ {
        (0..len / BaseNodes::NODE_DIM).map(move |node| BaseNodes::index(node, self.deriv, self.dim))
    }
}

impl CostModel for NodeCost {
    fn cost(&self, vars: &VariableSnapshot) -> NlpResult<f64> {
        let x = vars.get(&self.set_name)?;
        Ok(self.weight * self.indices(x.len()).map(|i| x[i] * x[i]).sum::<f64>())
    }

    fn fill_gradient(
        &self,
        vars: &VariableSnapshot,
        set_name: &str,
        gradient: &mut Jacobian,
    ) -> NlpResult<()> {
        if set_name != self.set_name {
            return Ok(());
        }
        let x = vars.get(set_name)?;
        for i in self.indices(x.len()) {
            gradient.set(0, i, 2.0 * self.weight * x[i]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::id;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use trajopt_core::{ConstraintSet, Cost, CostTerm, OptimizationVariables};

    #[test]
    fn test_node_cost_on_velocity() {
        let mut nodes = BaseNodes::new(id::BASE_LIN_NODES, 3);
        nodes.initialize_towards_goal(&Vector3::zeros(), &Vector3::new(2.0, 0.0, 1.0), 2.0);
        let mut vars = OptimizationVariables::new();
        let handle = vars.add(nodes).unwrap();

        let model = NodeCost::new(id::BASE_LIN_NODES, NodeDx::Vel, 0, 0.5);
        let mut cost = Cost::build("base-lin-vel-x", model, &[handle], &vars).unwrap();

        // velocity x = 1 at each of the 3 nodes
        assert_relative_eq!(cost.cost(), 1.5);
        let grad = cost.gradient(id::BASE_LIN_NODES).unwrap();
        assert_eq!(grad.nnz(), 3);
        assert_relative_eq!(grad.get(0, BaseNodes::index(1, NodeDx::Vel, 0)), 1.0);
        assert_relative_eq!(grad.get(0, BaseNodes::index(1, NodeDx::Vel, 2)), 0.0);

        let mut x = vars.values(id::BASE_LIN_NODES).unwrap();
        x[BaseNodes::index(2, NodeDx::Vel, 0)] = 3.0;
        vars.set_values(id::BASE_LIN_NODES, x.as_slice()).unwrap();
        cost.refresh_from_variables(&vars).unwrap();

        assert_relative_eq!(cost.cost(), 0.5 * (1.0 + 1.0 + 9.0));
        assert_relative_eq!(
            cost.gradient(id::BASE_LIN_NODES)
                .unwrap()
                .get(0, BaseNodes::index(2, NodeDx::Vel, 0)),
            3.0
        );
    }

    #[test]
    fn test_node_cost_ignores_other_sets() {
        let mut vars = OptimizationVariables::new();
        let lin = vars.add(BaseNodes::new(id::BASE_LIN_NODES, 2)).unwrap();
        let ang = vars.add(BaseNodes::new(id::BASE_ANG_NODES, 2)).unwrap();
        vars.set_values(id::BASE_ANG_NODES, &[1.0; 12]).unwrap();

        let model = NodeCost::new(id::BASE_LIN_NODES, NodeDx::Pos, 2, 1.0);
        let cost = Cost::build("c", model, &[lin, ang], &vars).unwrap();

        assert_relative_eq!(cost.cost(), 0.0);
        assert!(cost.gradient(id::BASE_ANG_NODES).unwrap().is_zero());
        assert_eq!(cost.gradient(id::BASE_ANG_NODES).unwrap().shape(), (1, 12));
    }
}

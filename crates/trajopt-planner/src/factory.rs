//! Problem factory
//!
//! Turns a [`PlannerConfig`] into variable sets, constraints and costs and
//! wires them into an [`Nlp`].

use trajopt_core::{
    Constraint, ConstraintSet, Cost, CostTerm, JacobianKind, NlpResult, OptimizationVariables,
    TimeDiscretization, TimeGrid,
};

use crate::config::{BaseState, ConstraintName, CostEntry, CostName, PlannerConfig, ProblemParameters};
use crate::constraints::{
    AccelerationContinuityConstraint, BaseMotionConstraint, TotalDurationConstraint,
};
use crate::costs::NodeCost;
use crate::error::PlannerError;
use crate::nlp::Nlp;
use crate::nodes::{id, BaseNodes, NodeDx, PhaseDurations};
use crate::spline::NodeSpline;

const ALL_DIMS: [usize; 3] = [0, 1, 2];

/// Builds the planning problem described by a configuration
#[derive(Debug, Clone)]
pub struct NlpFactory {
    params: ProblemParameters,
    initial_base: BaseState,
    final_base: BaseState,
}

impl NlpFactory {
    pub fn new(config: &PlannerConfig) -> Result<Self, PlannerError> {
        config.validate()?;
        Ok(Self {
            params: config.problem.clone(),
            initial_base: config.initial_base.clone(),
            final_base: config.final_base.clone(),
        })
    }

    pub fn params(&self) -> &ProblemParameters {
        &self.params
    }

    /// Complete problem, refreshed at the initial guess
    pub fn build(&self) -> Result<Nlp, PlannerError> {
        let variables = self.variable_sets()?;
        let constraints = self.constraints(&variables)?;
        let costs = self.costs(&variables)?;

        let mut nlp = Nlp::new(variables);
        for constraint in constraints {
            nlp.add_constraint(constraint);
        }
        for cost in costs {
            nlp.add_cost(cost);
        }

        tracing::info!(
            variables = nlp.num_variables(),
            constraints = nlp.num_constraints(),
            cost_terms = nlp.costs().count(),
            "built problem"
        );
        Ok(nlp)
    }

    fn base_spline(&self) -> NlpResult<NodeSpline> {
        NodeSpline::new(self.params.base_polynomial_durations())
    }

    /// Base linear/angular nodes, then one schedule per end effector if
    /// timings are optimized
    pub fn variable_sets(&self) -> NlpResult<OptimizationVariables> {
        let mut variables = OptimizationVariables::new();
        let num_nodes = self.base_spline()?.num_nodes();
        let total = self.params.total_duration;

        let mut lin = BaseNodes::new(id::BASE_LIN_NODES, num_nodes);
        lin.initialize_towards_goal(
            &self.initial_base.linear_position,
            &self.final_base.linear_position,
            total,
        );
        lin.add_start_bound(NodeDx::Pos, &ALL_DIMS, &self.initial_base.linear_position);
        lin.add_start_bound(NodeDx::Vel, &ALL_DIMS, &self.initial_base.linear_velocity);
        // final height is left to the range of motion
        lin.add_final_bound(NodeDx::Pos, &[0, 1], &self.final_base.linear_position);
        lin.add_final_bound(NodeDx::Vel, &ALL_DIMS, &self.final_base.linear_velocity);
        variables.add(lin)?;

        let mut ang = BaseNodes::new(id::BASE_ANG_NODES, num_nodes);
        ang.initialize_towards_goal(
            &self.initial_base.angular_position,
            &self.final_base.angular_position,
            total,
        );
        ang.add_start_bound(NodeDx::Pos, &ALL_DIMS, &self.initial_base.angular_position);
        ang.add_start_bound(NodeDx::Vel, &ALL_DIMS, &self.initial_base.angular_velocity);
        // only the final heading is prescribed
        ang.add_final_bound(NodeDx::Pos, &[2], &self.final_base.angular_position);
        ang.add_final_bound(NodeDx::Vel, &ALL_DIMS, &self.final_base.angular_velocity);
        variables.add(ang)?;

        if self.params.optimize_timings {
            for (ee, phases) in self.params.ee_phase_durations.iter().enumerate() {
                variables.add(PhaseDurations::new(
                    ee,
                    phases,
                    self.params.min_phase_duration,
                    self.params.max_phase_duration,
                ))?;
            }
        }
        Ok(variables)
    }

    /// Every enabled constraint, in configuration order
    pub fn constraints(
        &self,
        variables: &OptimizationVariables,
    ) -> NlpResult<Vec<Box<dyn ConstraintSet>>> {
        let mut constraints = Vec::new();
        for &name in &self.params.constraints {
            constraints.extend(self.constraint(name, variables)?);
        }
        Ok(constraints)
    }

    fn constraint(
        &self,
        name: ConstraintName,
        variables: &OptimizationVariables,
    ) -> NlpResult<Vec<Box<dyn ConstraintSet>>> {
        match name {
            ConstraintName::BaseRangeOfMotion => self.make_base_range_of_motion(variables),
            ConstraintName::BaseAcceleration => self.make_base_acceleration(variables),
            ConstraintName::TotalTime => self.make_total_time(variables),
        }
    }

    fn make_base_range_of_motion(
        &self,
        variables: &OptimizationVariables,
    ) -> NlpResult<Vec<Box<dyn ConstraintSet>>> {
        let grid = TimeGrid::fixed_interval(
            self.params.total_duration,
            self.params.dt_base_range_of_motion,
        )?;
        let instance = BaseMotionConstraint::new(self.base_spline()?, &self.params);
        let constraint = TimeDiscretization::new(grid, instance).build(
            "base-range-of-motion",
            JacobianKind::Constant,
            &[
                variables.handle(id::BASE_LIN_NODES)?,
                variables.handle(id::BASE_ANG_NODES)?,
            ],
            variables,
        )?;
        let boxed: Box<dyn ConstraintSet> = Box::new(constraint);
        Ok(vec![boxed])
    }

    fn make_base_acceleration(
        &self,
        variables: &OptimizationVariables,
    ) -> NlpResult<Vec<Box<dyn ConstraintSet>>> {
        let model =
            AccelerationContinuityConstraint::new(self.base_spline()?, self.params.junction_offset)?;
        let constraint = Constraint::build(
            "base-acceleration",
            model.num_rows(),
            model,
            JacobianKind::Constant,
            &[variables.handle(id::BASE_LIN_NODES)?],
            variables,
        )?;
        let boxed: Box<dyn ConstraintSet> = Box::new(constraint);
        Ok(vec![boxed])
    }

    fn make_total_time(
        &self,
        variables: &OptimizationVariables,
    ) -> NlpResult<Vec<Box<dyn ConstraintSet>>> {
        let mut constraints: Vec<Box<dyn ConstraintSet>> = Vec::new();
        for ee in 0..self.params.ee_count() {
            let model = TotalDurationConstraint::new(ee, self.params.total_duration)?;
            let handle = variables.handle(model.set_name())?;
            let constraint = Constraint::build(
                format!("total-time-{}", ee),
                1,
                model,
                JacobianKind::Constant,
                &[handle],
                variables,
            )?;
            constraints.push(Box::new(constraint));
        }
        Ok(constraints)
    }

    /// Every enabled cost, in configuration order
    pub fn costs(&self, variables: &OptimizationVariables) -> NlpResult<Vec<Box<dyn CostTerm>>> {
        let mut costs = Vec::new();
        for entry in &self.params.costs {
            costs.extend(self.cost(entry, variables)?);
        }
        Ok(costs)
    }

    /// One node cost per dimension
    fn cost(
        &self,
        entry: &CostEntry,
        variables: &OptimizationVariables,
    ) -> NlpResult<Vec<Box<dyn CostTerm>>> {
        let (set_name, label) = match entry.name {
            CostName::BaseLinearVelocity => (id::BASE_LIN_NODES, "base-lin-vel"),
            CostName::BaseAngularVelocity => (id::BASE_ANG_NODES, "base-ang-vel"),
        };
        let handle = variables.handle(set_name)?;

        let mut costs: Vec<Box<dyn CostTerm>> = Vec::new();
        for dim in ALL_DIMS {
            let model = NodeCost::new(set_name, NodeDx::Vel, dim, entry.weight);
            let cost = Cost::build(format!("{}-{}", label, dim), model, &[handle.clone()], variables)?;
            costs.push(Box::new(cost));
        }
        Ok(costs)
    }
}

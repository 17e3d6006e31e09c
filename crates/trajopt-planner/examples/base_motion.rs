//! Base Motion Problem
//!
//! Builds the base motion problem from a TOML file (or the defaults), then
//! evaluates the initial guess the way a solver's first iteration would.
//!
//! Usage:
//!   cargo run --example base_motion -- [config.toml]
//!   RUST_LOG=debug cargo run --example base_motion

use nalgebra::Vector3;

use trajopt_planner::nodes::id;
use trajopt_planner::{BaseNodes, BaseState, NlpFactory, NodeDx, PlannerConfig, PlannerError};

fn main() -> Result<(), PlannerError> {
    let config = match std::env::args().nth(1) {
        Some(path) => PlannerConfig::from_file(path)?,
        None => {
            let mut config = PlannerConfig::default();
            config.final_base = BaseState::at_position(Vector3::new(1.0, 0.3, 0.5));
            config
        }
    };
    config.logging.init();

    let mut nlp = NlpFactory::new(&config)?.build()?;
    tracing::info!(problem = ?nlp, "problem ready");

    let jacobian = nlp.jacobian()?;
    tracing::info!(
        rows = jacobian.nrows(),
        cols = jacobian.ncols(),
        nnz = jacobian.nnz(),
        "constraint jacobian"
    );

    let gradient = nlp.cost_gradient()?;
    tracing::info!(cost = nlp.cost(), gradient_norm = gradient.norm(), "initial guess");
    nlp.print_status(1e-6);

    // sag the base by 10 cm and look at the range of motion again
    let mut x = nlp.variable_values();
    let offset = nlp.variables().offset(id::BASE_LIN_NODES)?;
    let nodes = nlp.variables().size(id::BASE_LIN_NODES)? / BaseNodes::NODE_DIM;
    for node in 0..nodes {
        x[offset + BaseNodes::index(node, NodeDx::Pos, 2)] -= 0.1;
    }
    nlp.set_variables(x.as_slice())?;

    let violated: usize = nlp
        .print_status(1e-6)
        .iter()
        .map(|report| report.num_violated())
        .sum();
    tracing::info!(violated, "after lowering the base");

    Ok(())
}

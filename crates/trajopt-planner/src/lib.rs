//! Trajopt Planner
//!
//! Base motion planning problem built on the `trajopt-core` constraint
//! framework.
//!
//! # Architecture
//!
//! The base trajectory is a cubic Hermite spline whose node positions and
//! velocities are the decision variables. Optionally the contact phase
//! durations of each end effector are optimized too:
//!
//! ```text
//! minimize    Σ w·‖v_node‖²
//! subject to  base height/tilt in range      (sampled every dt)
//!             continuous base acceleration   (at polynomial junctions)
//!             Σ phase durations = T          (per end effector)
//!             start/final node bounds
//! ```
//!
//! # Components
//!
//! - [`config`]: Problem parameters and TOML loading
//! - [`nodes`]: Node and phase duration variable sets
//! - [`spline`]: Hermite spline over the nodes
//! - [`constraints`]: Concrete constraints
//! - [`costs`]: Node costs
//! - [`factory`]: Builds the problem from a configuration
//! - [`nlp`]: Global assembly for a solver

pub mod config;
pub mod constraints;
pub mod costs;
pub mod error;
pub mod factory;
pub mod nlp;
pub mod nodes;
pub mod spline;

// Re-exports
pub use config::{
    BaseState, ConstraintName, CostEntry, CostName, LoggingConfig, PlannerConfig,
    ProblemParameters,
};
pub use error::{ConfigError, PlannerError};
pub use factory::NlpFactory;
pub use nlp::Nlp;
pub use nodes::{BaseNodes, NodeDx, PhaseDurations};
pub use spline::{Dx, NodeSpline};

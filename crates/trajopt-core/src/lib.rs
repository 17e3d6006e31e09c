//! # Trajopt Core
//!
//! Constraint and cost framework for trajectory optimization problems
//! posed as a nonlinear program:
//!
//! ```text
//! minimize    Σⱼ cⱼ(x)
//! subject to  lower ≤ g(x) ≤ upper
//!             x_lower ≤ x ≤ x_upper
//! ```
//!
//! Decision variables `x` are grouped into named variable sets (spline
//! nodes, phase durations, ...). Each constraint depends on a few of these
//! sets and supplies its residual, its bounds and one sparse Jacobian block
//! per dependent set. The solver side stitches the blocks into one global
//! sparse system.
//!
//! ## Modules
//!
//! - [`variables`]: Variable sets and the registry that owns them
//! - [`sparse`]: Fixed-shape sparse Jacobian blocks
//! - [`dependent`]: Per-constraint dependent-variable registry
//! - [`constraint`]: Constraint contract and bookkeeping wrapper
//! - [`cost`]: Cost terms on top of the constraint machinery
//! - [`discretization`]: Sampling a continuous-time constraint
//! - [`bounds`]: Row bounds
//! - [`error`]: Error type

pub mod bounds;
pub mod constraint;
pub mod cost;
pub mod dependent;
pub mod discretization;
pub mod error;
pub mod sparse;
pub mod variables;

// Re-exports
pub use bounds::{Bounds, VecBound};
pub use constraint::{
    Constraint, ConstraintModel, ConstraintSet, JacobianKind, RowStatus, StatusReport,
};
pub use cost::{Cost, CostModel, CostTerm};
pub use dependent::{DependentVariables, JacobianBlocks, VarPair, VariableSnapshot};
pub use discretization::{
    DiscretizedConstraint, InstanceConstraint, InstanceRows, TimeDiscretization, TimeGrid,
};
pub use error::{NlpError, NlpResult};
pub use sparse::Jacobian;
pub use variables::{OptimizationVariables, VariableHandle, VariableSet, VectorVariables};

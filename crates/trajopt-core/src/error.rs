//! Error types
//!
//! Every error here is structural: it is raised while a problem is being
//! assembled (or when an invariant of an assembled problem is found broken)
//! and the problem must not be handed to a solver afterwards.

use thiserror::Error;

/// Errors raised while building or evaluating constraints and costs
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NlpError {
    #[error("Unknown variable set: {0}")]
    UnknownVariableSet(String),
    #[error("Constraint already depends on variable set {0}")]
    DuplicateDependency(String),
    #[error("Variable set {0} is already registered")]
    DuplicateVariableSet(String),
    #[error("Jacobian row count mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: usize, got: usize },
    #[error("Invalid bound at row {row}: lower {lower} > upper {upper}")]
    InvalidBound { row: usize, lower: f64, upper: f64 },
    #[error("Sample time {time} outside trajectory duration [0, {duration}]")]
    SampleOutOfRange { time: f64, duration: f64 },
    #[error("Invalid sampling: {0}")]
    InvalidSampling(String),
    #[error("Dimension mismatch for {set}: expected {expected}, got {got}")]
    DimensionMismatch {
        set: String,
        expected: usize,
        got: usize,
    },
    #[error("Internal invariant violated: {0}")]
    InvariantViolation(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result alias used throughout the framework
pub type NlpResult<T> = Result<T, NlpError>;

//! Planner errors

use thiserror::Error;
use trajopt_core::NlpError;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors while building or evaluating a planning problem
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Problem error: {0}")]
    Nlp(#[from] NlpError),
}

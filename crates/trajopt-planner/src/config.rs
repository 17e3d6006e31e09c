//! Planner configuration
//!
//! Problem parameters, boundary states and logging, loadable from TOML.

use std::path::Path;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Main planner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Timing, bounds and enabled constraints/costs
    pub problem: ProblemParameters,
    /// Base state at t = 0
    pub initial_base: BaseState,
    /// Desired base state at t = T
    pub final_base: BaseState,
    /// Log output
    pub logging: LoggingConfig,
}

impl PlannerConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.problem.validate()?;
        self.initial_base.validate("initial_base")?;
        self.final_base.validate("final_base")
    }
}

/// Constraints the problem factory knows how to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintName {
    /// Keep the base close to a nominal height and level orientation
    BaseRangeOfMotion,
    /// Continuous base linear acceleration across polynomial junctions
    BaseAcceleration,
    /// Phase durations of every end effector add up to the total time
    TotalTime,
}

/// Costs the problem factory knows how to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostName {
    /// Squared base linear velocity at every node
    BaseLinearVelocity,
    /// Squared base angular velocity at every node
    BaseAngularVelocity,
}

/// An enabled cost and its weight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEntry {
    pub name: CostName,
    pub weight: f64,
}

/// Problem parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProblemParameters {
    /// Total motion duration T [s]
    pub total_duration: f64,
    /// Duration of each base polynomial [s]
    pub duration_base_polynomial: f64,
    /// Sampling interval of the base range-of-motion constraint [s]
    pub dt_base_range_of_motion: f64,
    /// Base height the range of motion is centered on [m]
    pub nominal_base_height: f64,
    /// Allowed base height deviation from nominal [m]
    pub max_base_height_deviation: f64,
    /// Allowed roll/pitch deviation from level [rad]
    pub max_base_angular_deviation: f64,
    /// Offset of the samples around each polynomial junction [s]
    pub junction_offset: f64,
    /// Initial phase durations per end effector [s]
    pub ee_phase_durations: Vec<Vec<f64>>,
    pub min_phase_duration: f64,
    pub max_phase_duration: f64,
    /// Expose phase durations as decision variables
    pub optimize_timings: bool,
    pub constraints: Vec<ConstraintName>,
    pub costs: Vec<CostEntry>,
}

impl Default for ProblemParameters {
    fn default() -> Self {
        let dt_poly = 0.2;
        Self {
            total_duration: 2.0,
            duration_base_polynomial: dt_poly,
            dt_base_range_of_motion: dt_poly / 4.0,
            nominal_base_height: 0.5,
            max_base_height_deviation: 0.05,
            max_base_angular_deviation: 0.05,
            junction_offset: 1e-6,
            ee_phase_durations: vec![vec![0.4, 0.2, 0.4, 0.2, 0.4, 0.4]],
            min_phase_duration: 0.1,
            max_phase_duration: 1.0,
            optimize_timings: true,
            constraints: vec![
                ConstraintName::BaseRangeOfMotion,
                ConstraintName::BaseAcceleration,
                ConstraintName::TotalTime,
            ],
            costs: vec![CostEntry {
                name: CostName::BaseLinearVelocity,
                weight: 1.0,
            }],
        }
    }
}

impl ProblemParameters {
    /// Durations of the base polynomials: full polynomials of
    /// `duration_base_polynomial` plus a shorter remainder, if any
    pub fn base_polynomial_durations(&self) -> Vec<f64> {
        let eps = 1e-10;
        let dt = self.duration_base_polynomial;
        let full = ((self.total_duration + eps) / dt).floor() as usize;

        let mut durations = vec![dt; full];
        let remainder = self.total_duration - full as f64 * dt;
        if remainder > eps {
            durations.push(remainder);
        }
        durations
    }

    pub fn ee_count(&self) -> usize {
        self.ee_phase_durations.len()
    }

    pub fn has_constraint(&self, name: ConstraintName) -> bool {
        self.constraints.contains(&name)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("total_duration", self.total_duration)?;
        positive("duration_base_polynomial", self.duration_base_polynomial)?;
        positive("dt_base_range_of_motion", self.dt_base_range_of_motion)?;
        positive("junction_offset", self.junction_offset)?;
        non_negative("max_base_height_deviation", self.max_base_height_deviation)?;
        non_negative("max_base_angular_deviation", self.max_base_angular_deviation)?;
        if !self.nominal_base_height.is_finite() {
            return Err(ConfigError::Invalid(
                "nominal_base_height must be finite".to_string(),
            ));
        }

        // samples around a junction must not cross neighboring junctions
        if 2.0 * self.junction_offset >= self.duration_base_polynomial.min(self.total_duration) {
            return Err(ConfigError::Invalid(format!(
                "junction_offset {} too large for polynomials of {} s",
                self.junction_offset, self.duration_base_polynomial
            )));
        }

        positive("min_phase_duration", self.min_phase_duration)?;
        if self.max_phase_duration < self.min_phase_duration {
            return Err(ConfigError::Invalid(format!(
                "max_phase_duration {} below min_phase_duration {}",
                self.max_phase_duration, self.min_phase_duration
            )));
        }
        for (ee, phases) in self.ee_phase_durations.iter().enumerate() {
            if phases.is_empty() {
                return Err(ConfigError::Invalid(format!("ee {} has no phases", ee)));
            }
            for &d in phases {
                positive(&format!("ee {} phase duration", ee), d)?;
            }
        }

        if self.has_constraint(ConstraintName::TotalTime) && !self.optimize_timings {
            return Err(ConfigError::Invalid(
                "total_time constraint requires optimize_timings".to_string(),
            ));
        }
        for cost in &self.costs {
            non_negative(&format!("{:?} weight", cost.name), cost.weight)?;
        }
        Ok(())
    }
}

fn positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{} must be positive, got {}",
            name, value
        )))
    }
}

fn non_negative(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{} must be non-negative, got {}",
            name, value
        )))
    }
}

/// Linear and angular (Euler angles) base position and velocity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseState {
    pub linear_position: Vector3<f64>,
    pub linear_velocity: Vector3<f64>,
    pub angular_position: Vector3<f64>,
    pub angular_velocity: Vector3<f64>,
}

impl Default for BaseState {
    fn default() -> Self {
        Self {
            linear_position: Vector3::new(0.0, 0.0, 0.5),
            linear_velocity: Vector3::zeros(),
            angular_position: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
        }
    }
}

impl BaseState {
    pub fn at_position(linear_position: Vector3<f64>) -> Self {
        Self {
            linear_position,
            ..Self::default()
        }
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        let all_finite = [
            &self.linear_position,
            &self.linear_velocity,
            &self.angular_position,
            &self.angular_velocity,
        ]
        .iter()
        .all(|v| v.iter().all(|x| x.is_finite()));

        if all_finite {
            Ok(())
        } else {
            Err(ConfigError::Invalid(format!("{} has non-finite entries", name)))
        }
    }
}

/// Log output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Compact single-line output
    pub compact: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            compact: false,
        }
    }
}

impl LoggingConfig {
    /// Install a global subscriber; a no-op if one is already set
    pub fn init(&self) {
        use tracing_subscriber::EnvFilter;

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.level));
        let builder = tracing_subscriber::fmt().with_env_filter(filter);
        let result = if self.compact {
            builder.compact().try_init()
        } else {
            builder.try_init()
        };
        if result.is_err() {
            tracing::debug!("tracing subscriber already installed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_config_is_valid() {
        let config = PlannerConfig::default();
        assert!(config.validate().is_ok());

        let total: f64 = config.problem.ee_phase_durations[0].iter().sum();
        assert_relative_eq!(total, config.problem.total_duration, epsilon = 1e-12);
    }

    #[test]
    fn test_base_polynomial_durations() {
        let mut params = ProblemParameters::default();
        assert_eq!(params.base_polynomial_durations(), vec![0.2; 10]);

        params.total_duration = 0.5;
        let durations = params.base_polynomial_durations();
        assert_eq!(durations.len(), 3);
        assert_relative_eq!(durations[2], 0.1, epsilon = 1e-12);
        assert_relative_eq!(durations.iter().sum::<f64>(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_total_time_requires_optimized_timings() {
        let params = ProblemParameters {
            optimize_timings: false,
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let params = ProblemParameters {
            total_duration: -1.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = ProblemParameters {
            min_phase_duration: 0.5,
            max_phase_duration: 0.2,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = ProblemParameters {
            junction_offset: 0.15,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = PlannerConfig::from_toml_str(
            r#"
            [problem]
            total_duration = 1.0
            ee_phase_durations = [[0.5, 0.5]]
            constraints = ["base_range_of_motion", "total_time"]

            [final_base]
            linear_position = [1.0, 0.0, 0.5]
            "#,
        )
        .unwrap();

        assert_relative_eq!(config.problem.total_duration, 1.0);
        assert_relative_eq!(config.problem.duration_base_polynomial, 0.2);
        assert_eq!(config.problem.constraints.len(), 2);
        assert_relative_eq!(config.final_base.linear_position.x, 1.0);
        assert_eq!(config.initial_base, BaseState::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_parse_error() {
        let err = PlannerConfig::from_toml_str("[problem\ntotal_duration = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_toml_validation_error() {
        let err = PlannerConfig::from_toml_str(
            r#"
            [problem]
            optimize_timings = false
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}

//! Cubic Hermite spline over node values
//!
//! Polynomial `i` runs between node `i` and node `i + 1` for a fixed
//! duration `h`. With `s = τ / h` the position is
//!
//! ```text
//! p(τ) = h00(s)·p₀ + h·h10(s)·v₀ + h01(s)·p₁ + h·h11(s)·v₁
//! h00 = 2s³ - 3s² + 1     h10 = s³ - 2s² + s
//! h01 = -2s³ + 3s²        h11 = s³ - s²
//! ```
//!
//! Every output is linear in the node values, so the Jacobian w.r.t. the
//! nodes only depends on the evaluation time.

use nalgebra::{DVector, Vector3};
use trajopt_core::{NlpError, NlpResult};

use crate::nodes::{BaseNodes, NodeDx};

/// Derivative of the spline output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dx {
    Pos,
    Vel,
    Acc,
}

/// Contribution of one node value to the spline output
///
/// `∂ output[dim] / ∂ node(node, deriv)[dim] = coefficient` for every `dim`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeCoefficient {
    pub node: usize,
    pub deriv: NodeDx,
    pub coefficient: f64,
}

/// Fixed-duration polynomial sequence interpolating [`BaseNodes`]
#[derive(Debug, Clone)]
pub struct NodeSpline {
    durations: Vec<f64>,
    /// Start time of each polynomial, plus the end time
    junctions: Vec<f64>,
}

impl NodeSpline {
    pub fn new(durations: Vec<f64>) -> NlpResult<Self> {
        if durations.is_empty() {
            return Err(NlpError::InvalidConfig(
                "spline needs at least one polynomial".to_string(),
            ));
        }
        if let Some(d) = durations.iter().find(|d| !d.is_finite() || **d <= 0.0) {
            return Err(NlpError::InvalidConfig(format!(
                "polynomial durations must be positive, got {}",
                d
            )));
        }

        let mut junctions = Vec::with_capacity(durations.len() + 1);
        let mut t = 0.0;
        junctions.push(t);
        for d in &durations {
            t += d;
            junctions.push(t);
        }
        Ok(Self {
            durations,
            junctions,
        })
    }

    pub fn num_nodes(&self) -> usize {
        self.durations.len() + 1
    }

    pub fn durations(&self) -> &[f64] {
        &self.durations
    }

    pub fn total_duration(&self) -> f64 {
        self.junctions[self.durations.len()]
    }

    /// Polynomial active at `t` and the time since its start
    ///
    /// `t` is clamped to `[0, T]`; a junction belongs to the later polynomial.
    pub fn segment(&self, t: f64) -> (usize, f64) {
        let t = t.clamp(0.0, self.total_duration());
        let last = self.durations.len() - 1;
        let id = self.junctions[1..=last]
            .iter()
            .take_while(|&&start| start <= t)
            .count();
        (id, t - self.junctions[id])
    }

    /// Coefficients of the four node values shaping the output at `t`
    pub fn jacobian_wrt_nodes(&self, t: f64, deriv: Dx) -> [NodeCoefficient; 4] {
        let (id, tau) = self.segment(t);
        let h = self.durations[id];
        let s = tau / h;
        let (s2, s3) = (s * s, s * s * s);

        let [p0, v0, p1, v1] = match deriv {
            Dx::Pos => [
                2.0 * s3 - 3.0 * s2 + 1.0,
                h * (s3 - 2.0 * s2 + s),
                -2.0 * s3 + 3.0 * s2,
                h * (s3 - s2),
            ],
            Dx::Vel => [
                (6.0 * s2 - 6.0 * s) / h,
                3.0 * s2 - 4.0 * s + 1.0,
                (6.0 * s - 6.0 * s2) / h,
                3.0 * s2 - 2.0 * s,
            ],
            Dx::Acc => [
                (12.0 * s - 6.0) / (h * h),
                (6.0 * s - 4.0) / h,
                (6.0 - 12.0 * s) / (h * h),
                (6.0 * s - 2.0) / h,
            ],
        };

        [
            NodeCoefficient { node: id, deriv: NodeDx::Pos, coefficient: p0 },
            NodeCoefficient { node: id, deriv: NodeDx::Vel, coefficient: v0 },
            NodeCoefficient { node: id + 1, deriv: NodeDx::Pos, coefficient: p1 },
            NodeCoefficient { node: id + 1, deriv: NodeDx::Vel, coefficient: v1 },
        ]
    }

    /// Spline output at `t` for node values laid out as in [`BaseNodes`]
    pub fn point(&self, nodes: &DVector<f64>, t: f64, deriv: Dx) -> Vector3<f64> {
        self.jacobian_wrt_nodes(t, deriv)
            .iter()
            .map(|c| BaseNodes::value_of(nodes, c.node, c.deriv) * c.coefficient)
            .sum()
    }

    /// Check that a node vector fits this spline
    pub fn check_nodes(&self, set_name: &str, nodes: &DVector<f64>) -> NlpResult<()> {
        let expected = self.num_nodes() * BaseNodes::NODE_DIM;
        if nodes.len() != expected {
            return Err(NlpError::DimensionMismatch {
                set: set_name.to_string(),
                expected,
                got: nodes.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use trajopt_core::VariableSet;

    fn create_test_nodes() -> BaseNodes {
        let mut nodes = BaseNodes::new("nodes", 3);
        let values: Vec<f64> = (0..18).map(|i| (i as f64 * 0.37).sin()).collect();
        nodes.set_values(&values).unwrap();
        nodes
    }

    #[test]
    fn test_segment_lookup() {
        let spline = NodeSpline::new(vec![0.5, 0.25, 0.25]).unwrap();
        assert_eq!(spline.num_nodes(), 4);
        assert_relative_eq!(spline.total_duration(), 1.0);

        assert_eq!(spline.segment(0.0), (0, 0.0));
        let (id, tau) = spline.segment(0.6);
        assert_eq!(id, 1);
        assert_relative_eq!(tau, 0.1, epsilon = 1e-12);
        // junction belongs to the later polynomial
        assert_eq!(spline.segment(0.5).0, 1);
        // end belongs to the last polynomial
        let (id, tau) = spline.segment(1.0);
        assert_eq!(id, 2);
        assert_relative_eq!(tau, 0.25);
        // clamped
        assert_eq!(spline.segment(5.0).0, 2);
        assert_eq!(spline.segment(-1.0), (0, 0.0));
    }

    #[test]
    fn test_interpolates_nodes() {
        let nodes = create_test_nodes();
        let spline = NodeSpline::new(vec![0.4, 0.6]).unwrap();
        let values = nodes.values();

        for (node, t) in [(0, 0.0), (1, 0.4), (2, 1.0)] {
            assert_relative_eq!(
                spline.point(&values, t, Dx::Pos),
                nodes.value(node, NodeDx::Pos),
                epsilon = 1e-12
            );
            assert_relative_eq!(
                spline.point(&values, t, Dx::Vel),
                nodes.value(node, NodeDx::Vel),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_derivatives_match_finite_differences() {
        let nodes = create_test_nodes();
        let spline = NodeSpline::new(vec![0.4, 0.6]).unwrap();
        let values = nodes.values();
        let h = 1e-6;

        for t in [0.1, 0.3, 0.55, 0.9] {
            let dp = (spline.point(&values, t + h, Dx::Pos) - spline.point(&values, t - h, Dx::Pos))
                / (2.0 * h);
            assert_relative_eq!(dp, spline.point(&values, t, Dx::Vel), epsilon = 1e-6);

            let dv = (spline.point(&values, t + h, Dx::Vel) - spline.point(&values, t - h, Dx::Vel))
                / (2.0 * h);
            assert_relative_eq!(dv, spline.point(&values, t, Dx::Acc), epsilon = 1e-5);
        }
    }

    #[test]
    fn test_straight_line_has_zero_acceleration() {
        let mut nodes = BaseNodes::new("nodes", 4);
        nodes.initialize_towards_goal(&Vector3::zeros(), &Vector3::new(0.9, 0.0, 0.3), 0.9);
        let spline = NodeSpline::new(vec![0.3; 3]).unwrap();
        let values = nodes.values();

        for t in [0.0, 0.2, 0.45, 0.9] {
            assert_relative_eq!(spline.point(&values, t, Dx::Acc), Vector3::zeros(), epsilon = 1e-9);
        }
        assert_relative_eq!(
            spline.point(&values, 0.45, Dx::Pos),
            Vector3::new(0.45, 0.0, 0.15),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_invalid_durations() {
        assert!(NodeSpline::new(vec![]).is_err());
        assert!(NodeSpline::new(vec![0.2, 0.0]).is_err());
        assert!(NodeSpline::new(vec![f64::NAN]).is_err());
    }
}

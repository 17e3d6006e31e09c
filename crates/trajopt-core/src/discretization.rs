//! Time discretization
//!
//! A continuous-time path constraint `h(x(t)) ∈ [lower, upper]` for
//! `t ∈ [0, T]` is enforced at a finite, ordered set of sample times
//! `t_0 < t_1 < … < t_{K-1}`:
//!
//! ```text
//! g = [ h(t_0) ; h(t_1) ; … ; h(t_{K-1}) ]      (K · r rows)
//! instance k  ↔  rows [k·r, (k+1)·r)
//! ```
//!
//! The concrete constraint only implements the per-instance hooks of
//! [`InstanceConstraint`]; [`TimeDiscretization`] turns it into a
//! [`ConstraintModel`] and handles all row arithmetic. Row order always
//! follows time order.

use std::ops::Range;

use nalgebra::DVector;

use crate::bounds::Bounds;
use crate::constraint::{Constraint, ConstraintModel, JacobianKind};
use crate::dependent::{JacobianBlocks, VariableSnapshot};
use crate::error::{NlpError, NlpResult};
use crate::sparse::Jacobian;
use crate::variables::{OptimizationVariables, VariableHandle};

/// Tolerance, relative to the sampling interval, for deciding whether a
/// sample lands on the final time
const TIME_EPSILON: f64 = 1e-9;

/// Upper limit on the samples of a fixed-interval grid
pub const MAX_SAMPLES: usize = 10_000_000;

/// Strictly increasing sample times inside `[0, duration]`
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid {
    times: Vec<f64>,
    duration: f64,
}

impl TimeGrid {
    /// Samples every `dt` starting at 0, plus the final time if the last
    /// multiple of `dt` falls short of it. A zero duration has no samples.
    pub fn fixed_interval(duration: f64, dt: f64) -> NlpResult<Self> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(NlpError::InvalidSampling(format!(
                "duration must be finite and non-negative, got {}",
                duration
            )));
        }
        if !dt.is_finite() || dt <= 0.0 {
            return Err(NlpError::InvalidSampling(format!(
                "sampling interval must be positive, got {}",
                dt
            )));
        }
        if duration == 0.0 {
            return Ok(Self {
                times: Vec::new(),
                duration,
            });
        }

        let tol = TIME_EPSILON * dt.min(duration);
        let steps = ((duration + tol) / dt).floor();
        if !steps.is_finite() || steps >= MAX_SAMPLES as f64 {
            return Err(NlpError::InvalidSampling(format!(
                "sampling {} every {} exceeds {} samples",
                duration, dt, MAX_SAMPLES
            )));
        }
        let n = steps as usize;
        let mut times: Vec<f64> = (0..=n).map(|k| (k as f64 * dt).min(duration)).collect();

        // also constrain the very last instant
        match times.last_mut() {
            Some(last) if duration - *last <= tol => *last = duration,
            _ => times.push(duration),
        }

        Self::from_times(times, duration)
    }

    /// One sample at the start and one at the end of every phase
    pub fn from_durations(durations: &[f64]) -> NlpResult<Self> {
        Self::check_durations(durations)?;
        if durations.is_empty() {
            return Ok(Self {
                times: Vec::new(),
                duration: 0.0,
            });
        }

        let mut times = Vec::with_capacity(durations.len() + 1);
        let mut t = 0.0;
        times.push(t);
        for d in durations {
            t += d;
            times.push(t);
        }
        Self::from_times(times, t)
    }

    /// Samples just before and just after every junction between
    /// consecutive polynomials (`t_i ± eps`), plus the start and end time
    pub fn polynomial_junctions(durations: &[f64], eps: f64) -> NlpResult<Self> {
        Self::check_durations(durations)?;
        if !eps.is_finite() || eps <= 0.0 {
            return Err(NlpError::InvalidSampling(format!(
                "junction offset must be positive, got {}",
                eps
            )));
        }
        let Some((last, inner)) = durations.split_last() else {
            return Ok(Self {
                times: Vec::new(),
                duration: 0.0,
            });
        };

        let mut times = Vec::with_capacity(2 * durations.len());
        let mut t = 0.0;
        times.push(t);
        for d in inner {
            t += d;
            times.push(t - eps);
            times.push(t + eps);
        }
        t += last;
        times.push(t);

        Self::from_times(times, t)
    }

    /// Explicit sample times, validated against the duration
    pub fn from_times(times: Vec<f64>, duration: f64) -> NlpResult<Self> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(NlpError::InvalidSampling(format!(
                "duration must be finite and non-negative, got {}",
                duration
            )));
        }
        for &t in &times {
            if !(0.0..=duration).contains(&t) {
                return Err(NlpError::SampleOutOfRange { time: t, duration });
            }
        }
        if let Some(w) = times.windows(2).find(|w| w[1] <= w[0]) {
            return Err(NlpError::InvalidSampling(format!(
                "sample times must be strictly increasing, got {} after {}",
                w[1], w[0]
            )));
        }
        Ok(Self { times, duration })
    }

    fn check_durations(durations: &[f64]) -> NlpResult<()> {
        match durations.iter().find(|d| !d.is_finite() || **d <= 0.0) {
            Some(d) => Err(NlpError::InvalidSampling(format!(
                "phase durations must be positive, got {}",
                d
            ))),
            None => Ok(()),
        }
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// (k, t_k) in increasing time order
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.times.iter().copied().enumerate()
    }
}

/// Rows of one instance inside a shared Jacobian block
///
/// Row indices are local to the instance (`0..rows`); columns address the
/// full variable set.
pub struct InstanceRows<'a> {
    jacobian: &'a mut Jacobian,
    offset: usize,
    rows: usize,
}

impl<'a> InstanceRows<'a> {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn ncols(&self) -> usize {
        self.jacobian.ncols()
    }

    /// First global row of the instance
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.check_row(row);
        self.jacobian.get(self.offset + row, col)
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.check_row(row);
        self.jacobian.set(self.offset + row, col, value);
    }

    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.check_row(row);
        self.jacobian.add(self.offset + row, col, value);
    }

    fn check_row(&self, row: usize) {
        assert!(
            row < self.rows,
            "row {} outside instance with {} rows",
            row,
            self.rows
        );
    }
}

/// Per-instance math of a time-discretized constraint
pub trait InstanceConstraint: Send {
    /// Rows contributed by every sample
    fn rows_per_instance(&self) -> usize;

    /// Fill the `rows_per_instance` residual entries of sample `k` at time `t`
    fn update_constraint_at_instance(
        &self,
        t: f64,
        k: usize,
        vars: &VariableSnapshot,
        g: &mut [f64],
    ) -> NlpResult<()>;

    /// Fill the bounds of sample `k`
    fn update_bounds_at_instance(&self, t: f64, k: usize, bounds: &mut [Bounds]) -> NlpResult<()>;

    /// Fill the rows of sample `k` in the block w.r.t. `set_name`
    ///
    /// Leaves the rows zero by default.
    fn update_jacobian_at_instance(
        &self,
        _t: f64,
        _k: usize,
        _set_name: &str,
        _vars: &VariableSnapshot,
        _jac: &mut InstanceRows<'_>,
    ) -> NlpResult<()> {
        Ok(())
    }
}

/// Adapts an [`InstanceConstraint`] to a [`ConstraintModel`] over a grid
#[derive(Debug, Clone)]
pub struct TimeDiscretization<I> {
    grid: TimeGrid,
    rows_per_instance: usize,
    instance: I,
}

/// A constraint built from per-instance hooks
pub type DiscretizedConstraint<I> = Constraint<TimeDiscretization<I>>;

impl<I: InstanceConstraint> TimeDiscretization<I> {
    pub fn new(grid: TimeGrid, instance: I) -> Self {
        let rows_per_instance = instance.rows_per_instance();
        Self {
            grid,
            rows_per_instance,
            instance,
        }
    }

    /// Total residual dimension: samples × rows per instance
    pub fn num_rows(&self) -> usize {
        self.grid.len() * self.rows_per_instance
    }

    pub fn rows_per_instance(&self) -> usize {
        self.rows_per_instance
    }

    /// Residual rows owned by sample `k`
    pub fn row_range(&self, k: usize) -> Range<usize> {
        k * self.rows_per_instance..(k + 1) * self.rows_per_instance
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    pub fn instance(&self) -> &I {
        &self.instance
    }

    /// Wrap into a [`Constraint`] sized to the grid and subscribe/initialize it
    pub fn build(
        self,
        name: impl Into<String>,
        jacobian_kind: JacobianKind,
        dependencies: &[VariableHandle],
        variables: &OptimizationVariables,
    ) -> NlpResult<DiscretizedConstraint<I>> {
        let name = name.into();
        tracing::debug!(
            constraint = %name,
            samples = self.grid.len(),
            rows_per_instance = self.rows_per_instance,
            "discretized constraint"
        );
        let rows = self.num_rows();
        Constraint::build(name, rows, self, jacobian_kind, dependencies, variables)
    }
}

impl<I: InstanceConstraint> ConstraintModel for TimeDiscretization<I> {
    fn compute_residual(&self, vars: &VariableSnapshot, g: &mut DVector<f64>) -> NlpResult<()> {
        for (k, t) in self.grid.iter() {
            let rows = self.row_range(k);
            self.instance
                .update_constraint_at_instance(t, k, vars, &mut g.as_mut_slice()[rows])?;
        }
        Ok(())
    }

    fn compute_bounds(&self, bounds: &mut [Bounds]) -> NlpResult<()> {
        for (k, t) in self.grid.iter() {
            let rows = self.row_range(k);
            self.instance
                .update_bounds_at_instance(t, k, &mut bounds[rows])?;
        }
        Ok(())
    }

    fn compute_jacobians(
        &self,
        vars: &VariableSnapshot,
        blocks: &mut JacobianBlocks,
    ) -> NlpResult<()> {
        for (name, block) in blocks.iter_mut() {
            for (k, t) in self.grid.iter() {
                let mut rows = InstanceRows {
                    jacobian: &mut *block,
                    offset: k * self.rows_per_instance,
                    rows: self.rows_per_instance,
                };
                self.instance
                    .update_jacobian_at_instance(t, k, name, vars, &mut rows)?;
            }
        }
        Ok(())
    }
}

//! Trace synthesis: boundary → concrete trajectory under bounded-rate dynamics.
//!
//! Model
//! - Decision variables `x_0..x_{m-1}` (states) and `u_0..u_{m-2}` (increments)
//!   with `x_{i+1} = x_i + u_i`, box `state_min ≤ x_i ≤ state_max`, optional
//!   rate bound `|u_i| ≤ L`, and an epsilon tube `|x_i − b(t_i)| ≤ ε` around
//!   the boundary `b` sampled at `m` evenly spaced times over `[0, horizon]`.
//! - The system is rebuilt per call (`DynamicsSystem::build`) and handed to a
//!   `ConstraintSolver`. Infeasibility and timeouts are values
//!   (`SolveOutcome`), mapped here to `Unsatisfiable` / `SolverTimeout`.
//!
//! Code cross-refs: `geom::{Boundary, Trace}`, `enumerate::label_grid_boundary`.

mod solver;
mod system;

pub use solver::{ChainSolver, ConstraintSolver, SolveOutcome, Solution, SolverCfg};
pub use system::DynamicsSystem;

use crate::error::{KinkError, Result};
use crate::geom::{Boundary, Trace};

/// What to do when a sample time falls outside the boundary's x-range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OutOfRange {
    /// Fail the call with `OutOfRangeTime`.
    #[default]
    Reject,
    /// Continue along the nearest segment's slope.
    Extend,
}

/// Synthesis parameters (tube width, sampling, dynamics).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraceCfg {
    pub epsilon: f64,
    pub num_points: usize,
    /// Per-step bound on `|u_i|`; `None` leaves increments free.
    pub rate_bound: Option<f64>,
    pub state_min: f64,
    pub state_max: f64,
    pub out_of_range: OutOfRange,
}

impl Default for TraceCfg {
    fn default() -> Self {
        Self {
            epsilon: 0.01,
            num_points: 200,
            rate_bound: None,
            state_min: 0.0,
            state_max: 1.0,
            out_of_range: OutOfRange::Reject,
        }
    }
}

impl TraceCfg {
    pub fn validate(&self) -> Result<()> {
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(KinkError::invalid(format!(
                "epsilon must be > 0, got {}",
                self.epsilon
            )));
        }
        if self.num_points < 2 {
            return Err(KinkError::invalid(format!(
                "num_points must be >= 2, got {}",
                self.num_points
            )));
        }
        if let Some(l) = self.rate_bound {
            if !(l.is_finite() && l >= 0.0) {
                return Err(KinkError::invalid(format!("rate_bound must be >= 0, got {l}")));
            }
        }
        if !(self.state_min.is_finite() && self.state_max.is_finite())
            || self.state_min > self.state_max
        {
            return Err(KinkError::invalid("state bounds must satisfy min <= max"));
        }
        Ok(())
    }

    /// `num_points` evenly spaced times over `[0, horizon]`, endpoints included.
    pub fn sample_times(&self, horizon: f64) -> Vec<f64> {
        let last = (self.num_points - 1) as f64;
        (0..self.num_points)
            .map(|i| {
                if i + 1 == self.num_points {
                    horizon
                } else {
                    horizon * (i as f64) / last
                }
            })
            .collect()
    }
}

/// Synthesizer bound to a configuration and a solver backend.
#[derive(Clone, Debug, Default)]
pub struct Synthesizer<S = ChainSolver> {
    pub cfg: TraceCfg,
    pub solver_cfg: SolverCfg,
    pub solver: S,
}

impl Synthesizer<ChainSolver> {
    pub fn new(cfg: TraceCfg, solver_cfg: SolverCfg) -> Self {
        Self {
            cfg,
            solver_cfg,
            solver: ChainSolver,
        }
    }
}

impl<S: ConstraintSolver> Synthesizer<S> {
    /// Solve for a trace tracking `boundary` over `[0, horizon]`.
    ///
    /// Errors: `InvalidParams` (bad cfg/horizon), `OutOfRangeTime`,
    /// `Unsatisfiable`, `SolverTimeout`.
    pub fn synthesize(&self, boundary: &Boundary, horizon: f64) -> Result<Trace> {
        self.cfg.validate()?;
        if !(horizon.is_finite() && horizon > 0.0) {
            return Err(KinkError::invalid(format!("horizon must be > 0, got {horizon}")));
        }
        let times = self.cfg.sample_times(horizon);
        let sys = DynamicsSystem::build(boundary, &times, &self.cfg)?;
        match self.solver.solve(&sys, &self.solver_cfg) {
            SolveOutcome::Feasible(sol) => {
                debug_assert!(sys.check(&sol, 1e-9));
                Ok(Trace::from_samples(&times, &sol.xs))
            }
            SolveOutcome::Infeasible { sample } => Err(KinkError::Unsatisfiable { sample }),
            SolveOutcome::TimedOut { elapsed } => Err(KinkError::SolverTimeout {
                elapsed_ms: elapsed.as_millis(),
            }),
        }
    }
}

/// One-shot synthesis with the default solver and box `[0, 1]`.
pub fn synthesize(
    boundary: &Boundary,
    epsilon: f64,
    num_points: usize,
    horizon: f64,
) -> Result<Trace> {
    let cfg = TraceCfg {
        epsilon,
        num_points,
        ..TraceCfg::default()
    };
    Synthesizer::new(cfg, SolverCfg::default()).synthesize(boundary, horizon)
}

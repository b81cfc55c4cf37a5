//! Constraint solvers for `DynamicsSystem`.
//!
//! - `ConstraintSolver`: backend seam; one `solve` call per synthesis.
//! - `ChainSolver`: exact solver for the chain structure. The constraints are
//!   per-sample intervals plus difference bounds between neighbours, so a
//!   forward interval sweep decides feasibility and a backward sweep picks a
//!   witness (closest to the boundary at every sample).
//!
//! The sweep is O(m); the deadline exists so callers can bound heavier
//! backends behind the same trait and still observe `TimedOut`.

use std::time::{Duration, Instant};

use super::system::DynamicsSystem;

/// Solver configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolverCfg {
    /// Wall-clock budget per solve; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Slack when comparing interval endpoints for emptiness.
    pub eps_feas: f64,
}

impl Default for SolverCfg {
    fn default() -> Self {
        Self {
            timeout: None,
            eps_feas: 1e-12,
        }
    }
}

/// Solved assignment for states and increments.
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    pub xs: Vec<f64>,
    pub us: Vec<f64>,
}

/// Result of one solver call.
#[derive(Clone, Debug, PartialEq)]
pub enum SolveOutcome {
    Feasible(Solution),
    /// Proven infeasible; `sample` is the first index whose reachable set is empty.
    Infeasible { sample: usize },
    TimedOut { elapsed: Duration },
}

/// Backend seam for trace synthesis.
pub trait ConstraintSolver: Send + Sync {
    fn solve(&self, sys: &DynamicsSystem, cfg: &SolverCfg) -> SolveOutcome;
}

/// Interval propagation along the sample chain.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChainSolver;

// Check the clock every this many samples.
const CLOCK_STRIDE: usize = 64;

struct Deadline {
    start: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    fn new(limit: Option<Duration>) -> Self {
        Self {
            start: Instant::now(),
            limit,
        }
    }

    #[inline]
    fn expired(&self, step: usize) -> Option<Duration> {
        let limit = self.limit?;
        if step % CLOCK_STRIDE != 0 {
            return None;
        }
        let elapsed = self.start.elapsed();
        (elapsed >= limit).then_some(elapsed)
    }
}

impl ConstraintSolver for ChainSolver {
    fn solve(&self, sys: &DynamicsSystem, cfg: &SolverCfg) -> SolveOutcome {
        let m = sys.num_states();
        if m == 0 {
            return SolveOutcome::Feasible(Solution {
                xs: Vec::new(),
                us: Vec::new(),
            });
        }
        let rate = sys.rate.unwrap_or(f64::INFINITY);
        let clock = Deadline::new(cfg.timeout);

        // Forward sweep: reach[i] = box_i ∩ (reach[i-1] ⊕ [-rate, rate]).
        let mut lo = Vec::with_capacity(m);
        let mut hi = Vec::with_capacity(m);
        for i in 0..m {
            if let Some(elapsed) = clock.expired(i) {
                return SolveOutcome::TimedOut { elapsed };
            }
            let (mut a, mut b) = (sys.lo[i], sys.hi[i]);
            if i > 0 {
                a = a.max(lo[i - 1] - rate);
                b = b.min(hi[i - 1] + rate);
            }
            if a > b + cfg.eps_feas {
                return SolveOutcome::Infeasible { sample: i };
            }
            // collapse slack-level inversions to a point
            if a > b {
                a = b;
            }
            lo.push(a);
            hi.push(b);
        }

        // Backward sweep: stay within rate of the chosen successor, track target.
        let mut xs = vec![0.0; m];
        xs[m - 1] = sys.target[m - 1].max(lo[m - 1]).min(hi[m - 1]);
        for i in (0..m - 1).rev() {
            if let Some(elapsed) = clock.expired(m + i) {
                return SolveOutcome::TimedOut { elapsed };
            }
            let a = lo[i].max(xs[i + 1] - rate);
            let b = hi[i].min(xs[i + 1] + rate);
            xs[i] = sys.target[i].max(a).min(b);
        }
        let us = xs.windows(2).map(|w| w[1] - w[0]).collect();
        SolveOutcome::Feasible(Solution { xs, us })
    }
}

//! The per-call dynamics constraint system.

use crate::error::Result;
use crate::geom::Boundary;

use super::{OutOfRange, TraceCfg};

/// Constraints over states `x_0..x_{m-1}` and increments `u_0..u_{m-2}`.
///
/// Per sample `i`: `lo[i] ≤ x_i ≤ hi[i]`, where `[lo, hi]` is the state box
/// intersected with the epsilon tube around `target[i]`. Between samples:
/// `x_{i+1} = x_i + u_i` and, if `rate` is set, `|u_i| ≤ rate`.
#[derive(Clone, Debug)]
pub struct DynamicsSystem {
    pub target: Vec<f64>,
    pub lo: Vec<f64>,
    pub hi: Vec<f64>,
    pub rate: Option<f64>,
    pub epsilon: f64,
    pub state_min: f64,
    pub state_max: f64,
}

impl DynamicsSystem {
    /// Interpolate `boundary` at each time and build the tube constraints.
    pub fn build(boundary: &Boundary, times: &[f64], cfg: &TraceCfg) -> Result<Self> {
        let mut target = Vec::with_capacity(times.len());
        for &t in times {
            let v = match cfg.out_of_range {
                OutOfRange::Reject => boundary.value_at(t)?,
                OutOfRange::Extend => boundary.value_at_extended(t)?,
            };
            target.push(v);
        }
        let lo = target
            .iter()
            .map(|v| (v - cfg.epsilon).max(cfg.state_min))
            .collect();
        let hi = target
            .iter()
            .map(|v| (v + cfg.epsilon).min(cfg.state_max))
            .collect();
        Ok(Self {
            target,
            lo,
            hi,
            rate: cfg.rate_bound,
            epsilon: cfg.epsilon,
            state_min: cfg.state_min,
            state_max: cfg.state_max,
        })
    }

    #[inline]
    pub fn num_states(&self) -> usize {
        self.target.len()
    }

    /// Verify a candidate solution against every constraint, with slack `tol`.
    pub fn check(&self, sol: &super::Solution, tol: f64) -> bool {
        let m = self.num_states();
        if sol.xs.len() != m || sol.us.len() + 1 != m {
            return false;
        }
        let states_ok = sol.xs.iter().zip(&self.target).all(|(&x, &b)| {
            x >= self.state_min - tol
                && x <= self.state_max + tol
                && (x - b).abs() <= self.epsilon + tol
        });
        let dynamics_ok = sol.us.iter().enumerate().all(|(i, &u)| {
            (sol.xs[i + 1] - (sol.xs[i] + u)).abs() <= tol
                && self.rate.map_or(true, |l| u.abs() <= l + tol)
        });
        states_ok && dynamics_ok
    }
}

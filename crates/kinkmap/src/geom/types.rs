//! Value types for parameter space and its discretization.
//!
//! - `ParamBox`: the admissible rectangle `[x_lo, x_hi] × [y_lo, y_hi]`.
//! - `Boundary`: x-monotone polyline in parameter space.
//! - `GridDims` / `GridBoundary`: the discretized counterparts.
//! - `Trace`: solved samples, one per evenly spaced time.
//! - `Affine2`: `p ↦ M p + t`, used for inversion.

use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};

use super::EPS_X;
use crate::error::{KinkError, Result};

/// Rectangular parameter domain.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParamBox {
    pub x: (f64, f64),
    pub y: (f64, f64),
}

impl ParamBox {
    /// The `[0,20] × [0,1]` box the envelope anchors are written against.
    pub fn canonical() -> Self {
        Self {
            x: (0.0, 20.0),
            y: (0.0, 1.0),
        }
    }

    #[inline]
    pub fn contains(&self, p: Vector2<f64>) -> bool {
        p.x >= self.x.0 && p.x <= self.x.1 && p.y >= self.y.0 && p.y <= self.y.1
    }

    /// Center of the box; inversion is the point reflection through it.
    #[inline]
    pub fn center(&self) -> Vector2<f64> {
        Vector2::new(0.5 * (self.x.0 + self.x.1), 0.5 * (self.y.0 + self.y.1))
    }
}

/// 2D affine map: `p ↦ M p + t`.
#[derive(Clone, Copy, Debug)]
pub struct Affine2 {
    pub m: Matrix2<f64>,
    pub t: Vector2<f64>,
}

impl Affine2 {
    /// Point reflection through the center of `pbox` (180° rotation).
    #[inline]
    pub fn point_reflection(pbox: &ParamBox) -> Self {
        Self {
            m: -Matrix2::identity(),
            t: Vector2::new(pbox.x.0 + pbox.x.1, pbox.y.0 + pbox.y.1),
        }
    }

    #[inline]
    pub fn apply(&self, p: Vector2<f64>) -> Vector2<f64> {
        self.m * p + self.t
    }

    /// x-monotone polylines stay x-monotone (up to reversal) iff the map does
    /// not mix y into x.
    #[inline]
    pub fn preserves_time_axis(&self) -> bool {
        self.m[(0, 1)] == 0.0 && self.m[(0, 0)] != 0.0
    }
}

/// Piecewise-linear curve in parameter space.
///
/// Invariants:
/// - non-empty;
/// - x non-decreasing (equal consecutive x is a vertical jump).
#[derive(Clone, Debug, PartialEq)]
pub struct Boundary {
    pts: Vec<Vector2<f64>>,
}

impl Boundary {
    pub fn new(pts: Vec<Vector2<f64>>) -> Result<Self> {
        if pts.is_empty() {
            return Err(KinkError::invalid("boundary needs at least one point"));
        }
        if pts.iter().any(|p| !(p.x.is_finite() && p.y.is_finite())) {
            return Err(KinkError::invalid("boundary points must be finite"));
        }
        if pts.windows(2).any(|w| w[1].x < w[0].x) {
            return Err(KinkError::invalid("boundary x must be non-decreasing"));
        }
        Ok(Self { pts })
    }

    #[inline]
    pub(crate) fn from_sorted(pts: Vec<Vector2<f64>>) -> Self {
        debug_assert!(!pts.is_empty() && pts.windows(2).all(|w| w[0].x <= w[1].x));
        Self { pts }
    }

    /// Build from `(x, y)` pairs.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self> {
        Self::new(pairs.iter().map(|&(x, y)| Vector2::new(x, y)).collect())
    }

    #[inline]
    pub fn points(&self) -> &[Vector2<f64>] {
        &self.pts
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pts.is_empty()
    }

    /// `(x_first, x_last)`.
    #[inline]
    pub fn x_range(&self) -> (f64, f64) {
        (self.pts[0].x, self.pts[self.pts.len() - 1].x)
    }

    /// Linear interpolation at `t`.
    ///
    /// Segment selection is half-open `[x_k, x_{k+1})`, except that `t` equal
    /// to the last x yields the last point's value. Vertical jumps therefore
    /// resolve to the value after the jump. Times within `EPS_X` of the domain
    /// are clamped; anything further out is `OutOfRangeTime`.
    pub fn value_at(&self, t: f64) -> Result<f64> {
        let (lo, hi) = self.x_range();
        if t < lo - EPS_X || t > hi + EPS_X || !t.is_finite() {
            return Err(KinkError::OutOfRangeTime { t, lo, hi });
        }
        let t = t.clamp(lo, hi);
        if t >= hi {
            return Ok(self.pts[self.pts.len() - 1].y);
        }
        // first index with x > t; the bracketing segment ends there
        let k = self.pts.partition_point(|p| p.x <= t);
        let (a, b) = (self.pts[k - 1], self.pts[k]);
        let s = (t - a.x) / (b.x - a.x);
        Ok(a.y + s * (b.y - a.y))
    }

    /// Like `value_at`, but times outside the domain continue along the
    /// nearest segment's slope (a constant for single-point boundaries).
    pub fn value_at_extended(&self, t: f64) -> Result<f64> {
        let (lo, hi) = self.x_range();
        if !t.is_finite() {
            return Err(KinkError::OutOfRangeTime { t, lo, hi });
        }
        if t >= lo - EPS_X && t <= hi + EPS_X {
            return self.value_at(t);
        }
        let last = self.pts[self.pts.len() - 1];
        // the anchor is the point `value_at` resolves the domain end to
        let (a, b, anchor) = if t < lo {
            match self.pts.iter().position(|p| p.x > lo) {
                Some(k) => (self.pts[k - 1], self.pts[k], self.pts[k - 1]),
                None => return Ok(last.y),
            }
        } else {
            match self.pts.iter().rposition(|p| p.x < hi) {
                Some(k) => (self.pts[k], self.pts[k + 1], last),
                None => return Ok(last.y),
            }
        };
        let slope = (b.y - a.y) / (b.x - a.x);
        Ok(anchor.y + slope * (t - anchor.x))
    }
}

/// Grid discretization of parameter space.
///
/// Valid indices are `0..=num_x` and `0..=num_y`; index `(i, j)` maps to
/// `(i * x_spacing, j * y_spacing)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridDims {
    pub x_spacing: f64,
    pub num_x: u32,
    pub y_spacing: f64,
    pub num_y: u32,
}

impl GridDims {
    pub fn validate(&self) -> Result<()> {
        if !(self.x_spacing.is_finite() && self.x_spacing > 0.0) {
            return Err(KinkError::InvalidGridDims(format!(
                "x_spacing must be > 0, got {}",
                self.x_spacing
            )));
        }
        if !(self.y_spacing.is_finite() && self.y_spacing > 0.0) {
            return Err(KinkError::InvalidGridDims(format!(
                "y_spacing must be > 0, got {}",
                self.y_spacing
            )));
        }
        if self.num_x < 1 || self.num_y < 1 {
            return Err(KinkError::InvalidGridDims(format!(
                "num_x and num_y must be >= 1, got {} and {}",
                self.num_x, self.num_y
            )));
        }
        Ok(())
    }

    /// Largest x reachable on the grid; boundaries span `[0, x_max]`.
    #[inline]
    pub fn x_max(&self) -> f64 {
        f64::from(self.num_x) * self.x_spacing
    }

    #[inline]
    pub fn y_max(&self) -> f64 {
        f64::from(self.num_y) * self.y_spacing
    }

    /// Largest kink count a grid boundary can have: a column holds at most
    /// two points (a vertical jump), so at most `2 * (num_x + 1)` points.
    #[inline]
    pub fn max_kinks(&self) -> usize {
        2 * self.num_x as usize
    }
}

/// Boundary in grid index coordinates.
///
/// Ordering and hashing are structural, so grid boundaries key the result map.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridBoundary {
    pub pts: Vec<(u32, u32)>,
}

impl GridBoundary {
    pub fn new(pts: Vec<(u32, u32)>) -> Self {
        Self { pts }
    }

    /// Number of interior points where the slope changes (exact, integer).
    pub fn kinks(&self) -> usize {
        self.pts
            .windows(3)
            .filter(|w| !collinear_idx(w[0], w[1], w[2]))
            .count()
    }

    /// Check index range, x-monotonicity and full span `0 → num_x`.
    pub fn validate(&self, dims: &GridDims) -> Result<()> {
        for &(i, j) in &self.pts {
            if i > dims.num_x || j > dims.num_y {
                return Err(KinkError::InvalidGridIndex {
                    i,
                    j,
                    num_x: dims.num_x,
                    num_y: dims.num_y,
                });
            }
        }
        match (self.pts.first(), self.pts.last()) {
            (Some(first), Some(last)) if first.0 == 0 && last.0 == dims.num_x => {}
            _ => {
                return Err(KinkError::invalid(format!(
                    "grid boundary must span x-index 0 to {}",
                    dims.num_x
                )))
            }
        }
        if self.pts.windows(2).any(|w| w[1].0 < w[0].0) {
            return Err(KinkError::invalid("grid boundary x-index must be non-decreasing"));
        }
        Ok(())
    }
}

/// Integer collinearity test via the cross product of the two legs.
#[inline]
pub(crate) fn collinear_idx(a: (u32, u32), b: (u32, u32), c: (u32, u32)) -> bool {
    let (ax, ay) = (i64::from(a.0), i64::from(a.1));
    let (bx, by) = (i64::from(b.0), i64::from(b.1));
    let (cx, cy) = (i64::from(c.0), i64::from(c.1));
    (bx - ax) * (cy - by) - (by - ay) * (cx - bx) == 0
}

/// Solved trajectory: one sample per evenly spaced time over `[0, horizon]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Trace {
    pts: Vec<Vector2<f64>>,
}

impl Trace {
    pub(crate) fn from_samples(times: &[f64], values: &[f64]) -> Self {
        debug_assert_eq!(times.len(), values.len());
        Self {
            pts: times
                .iter()
                .zip(values)
                .map(|(&t, &v)| Vector2::new(t, v))
                .collect(),
        }
    }

    /// Build a trace from explicit points (used by tests and external labelers).
    pub fn from_points(pts: Vec<Vector2<f64>>) -> Self {
        Self { pts }
    }

    #[inline]
    pub fn points(&self) -> &[Vector2<f64>] {
        &self.pts
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pts.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.pts.iter().map(|p| p.y)
    }
}

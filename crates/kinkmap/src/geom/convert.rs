//! Transforms between representations: grid ↔ parameters, inversion,
//! dense samples → boundary.

use nalgebra::Vector2;

use super::types::{Affine2, Boundary, GridBoundary, GridDims, ParamBox};
use crate::error::{KinkError, Result};

/// Map each grid index pair `(i, j)` to `(i * x_spacing, j * y_spacing)`.
///
/// Fails with `InvalidGridIndex` on the first index beyond `num_x`/`num_y`.
pub fn grid_to_param(gb: &GridBoundary, dims: &GridDims) -> Result<Boundary> {
    let mut pts = Vec::with_capacity(gb.pts.len());
    for &(i, j) in &gb.pts {
        if i > dims.num_x || j > dims.num_y {
            return Err(KinkError::InvalidGridIndex {
                i,
                j,
                num_x: dims.num_x,
                num_y: dims.num_y,
            });
        }
        pts.push(Vector2::new(
            f64::from(i) * dims.x_spacing,
            f64::from(j) * dims.y_spacing,
        ));
    }
    Boundary::new(pts)
}

/// Rotate a boundary by 180° inside `pbox`, then reverse the point order so
/// the result is x-monotone again.
///
/// `new_x = x_lo + x_hi - x`, `new_y = y_lo + y_hi - y`. Applying it twice
/// returns the input (up to rounding).
pub fn invert(boundary: &Boundary, pbox: &ParamBox) -> Boundary {
    let phi = Affine2::point_reflection(pbox);
    debug_assert!(phi.preserves_time_axis());
    let pts: Vec<Vector2<f64>> = boundary
        .points()
        .iter()
        .rev()
        .map(|&p| phi.apply(p))
        .collect();
    // x ↦ c - x is monotone under rounding, so the reversed order is sorted.
    Boundary::from_sorted(pts)
}

#[inline]
fn cross(a: Vector2<f64>, b: Vector2<f64>, c: Vector2<f64>) -> f64 {
    let ab = b - a;
    let ac = c - a;
    ab.x * ac.y - ab.y * ac.x
}

/// Collapse dense samples into a boundary: interior points whose distance to
/// the chord between the last kept point and their successor is at most `tol`
/// are dropped. Endpoints are always kept.
pub fn trace_to_boundary(samples: &[Vector2<f64>], tol: f64) -> Result<Boundary> {
    if samples.is_empty() {
        return Err(KinkError::invalid("cannot build a boundary from zero samples"));
    }
    let mut kept: Vec<Vector2<f64>> = Vec::with_capacity(samples.len());
    kept.push(samples[0]);
    for k in 1..samples.len().saturating_sub(1) {
        let a = kept[kept.len() - 1];
        let b = samples[k];
        let c = samples[k + 1];
        let chord = (c - a).norm();
        let off = if chord > 0.0 {
            cross(a, b, c).abs() / chord
        } else {
            (b - a).norm()
        };
        if off > tol {
            kept.push(b);
        }
    }
    if samples.len() > 1 {
        kept.push(samples[samples.len() - 1]);
    }
    Boundary::new(kept)
}

/// Number of interior direction changes, ignoring zero-length legs.
///
/// A vertex counts as a kink when the sine of the turn angle exceeds `tol`.
pub fn kink_count(boundary: &Boundary, tol: f64) -> usize {
    let mut legs: Vec<Vector2<f64>> = Vec::with_capacity(boundary.len());
    for w in boundary.points().windows(2) {
        let d = w[1] - w[0];
        if d.norm() > 0.0 {
            legs.push(d);
        }
    }
    legs.windows(2)
        .filter(|w| {
            let (u, v) = (w[0], w[1]);
            let s = (u.x * v.y - u.y * v.x) / (u.norm() * v.norm());
            s.abs() > tol
        })
        .count()
}

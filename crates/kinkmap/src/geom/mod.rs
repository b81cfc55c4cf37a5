//! Geometry utilities over the two-dimensional parameter space.
//!
//! Purpose
//! - Hold the value types shared by every stage: parameter points, boundaries,
//!   grid boundaries, traces and the rectangular parameter box.
//! - Provide the coordinate transforms between grid indices and real
//!   parameters, the 180° inversion, and the dense-samples → boundary
//!   simplification.
//!
//! Conventions
//! - x is the time-like coordinate, y the bounded state value.
//! - Boundaries are x-monotone (non-decreasing); equal consecutive x encodes a
//!   vertical jump.
//! - Equality checks on reals use explicit tolerances (`EPS_X`, caller `tol`).

mod convert;
mod types;

pub use convert::{grid_to_param, invert, kink_count, trace_to_boundary};
pub(crate) use types::collinear_idx;
pub use types::{Affine2, Boundary, GridBoundary, GridDims, ParamBox, Trace};

/// Slack used when deciding whether a time lies inside a boundary's domain.
pub const EPS_X: f64 = 1e-9;

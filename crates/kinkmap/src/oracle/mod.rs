//! Labeling of traces: the polygon envelope oracle and interchangeable
//! labeling strategies behind the `Labeler` trait.
//!
//! Semantics of the polygon oracle
//! - Upper: every sample satisfies `y ≤ upper(x)`.
//! - Lower (eventually-above): for every index `i` some `j ≥ i` has
//!   `y_j ≥ lower(x_i)`. Quantifier order is ∀i ∃j≥i. A pointwise variant is
//!   kept as `LowerPolicy::Pointwise` for comparison runs.
//! - Label = upper ∧ lower.

mod envelope;
mod labeler;

pub use envelope::{Envelope, EnvelopeSpec, PiecewiseLinear};
pub use labeler::{FnLabeler, Labeler, LowerPolicy, PolygonOracle, PromptLabeler};

#[cfg(test)]
mod tests;

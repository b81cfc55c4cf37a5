//! Error kinds shared by the synthesis, labeling and enumeration layers.
//!
//! Two scopes:
//! - per-boundary (`InvalidGridIndex`, `OutOfRangeTime`, `Unsatisfiable`,
//!   `SolverTimeout`): the enumerator skips the boundary and keeps going;
//! - run-level (everything else): the driver aborts and hands the error back.

use thiserror::Error;

/// Errors surfaced by the core pipeline.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum KinkError {
    #[error("grid index ({i}, {j}) outside grid [0, {num_x}] x [0, {num_y}]")]
    InvalidGridIndex {
        i: u32,
        j: u32,
        num_x: u32,
        num_y: u32,
    },

    #[error("time {t} outside boundary domain [{lo}, {hi}]")]
    OutOfRangeTime { t: f64, lo: f64, hi: f64 },

    #[error("no trace satisfies the dynamics constraints (first empty sample: {sample})")]
    Unsatisfiable { sample: usize },

    #[error("solver gave up after {elapsed_ms} ms (reason: timeout)")]
    SolverTimeout { elapsed_ms: u128 },

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("invalid grid dimensions: {0}")]
    InvalidGridDims(String),

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("run cancelled")]
    Cancelled,
}

impl KinkError {
    /// True for errors that only invalidate a single boundary.
    pub fn is_per_boundary(&self) -> bool {
        matches!(
            self,
            Self::InvalidGridIndex { .. }
                | Self::OutOfRangeTime { .. }
                | Self::Unsatisfiable { .. }
                | Self::SolverTimeout { .. }
        )
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidParams(reason.into())
    }
}

/// Convenience alias for results using [`KinkError`].
pub type Result<T> = std::result::Result<T, KinkError>;

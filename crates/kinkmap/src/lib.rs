//! Exhaustive classification maps over a discretized 2D parameter space.
//!
//! Pipeline
//! - `enumerate`: every grid boundary with exactly `n` kinks (lazy DFS).
//! - `geom`: grid → parameter coordinates, inversion, simplification.
//! - `synth`: boundary → trace by solving the bounded-rate dynamics system.
//! - `oracle`: trace → label (polygon envelope, closures, human prompt).
//! - `driver`: kink counts `0..=max_kinks` on a worker pool, one artefact.
//!
//! API Policy
//! - Project-internal crate; no stable public API. The `prelude` collects
//!   what callers usually need.

pub mod driver;
pub mod enumerate;
pub mod error;
pub mod geom;
pub mod oracle;
pub mod pipeline;
pub mod synth;
pub mod visual;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use error::{KinkError, Result};

/// Common exports for quick imports in callers.
pub mod prelude {
    pub use crate::driver::{classify_all, CancelToken, ClassificationMap, ClassifyCfg, RunStats};
    pub use crate::enumerate::{
        enumerate, enumerate_outcomes, label_grid_boundary, sample_grid_boundary,
        ClassificationRecord, GridBoundaries, ReplayToken,
    };
    pub use crate::error::{KinkError, Result};
    pub use crate::geom::{
        grid_to_param, invert, kink_count, trace_to_boundary, Boundary, GridBoundary, GridDims,
        ParamBox, Trace,
    };
    pub use crate::oracle::{
        Envelope, EnvelopeSpec, FnLabeler, Labeler, LowerPolicy, PolygonOracle, PromptLabeler,
    };
    pub use crate::pipeline::{positive_example, LabelPipeline};
    pub use crate::synth::{
        synthesize, ChainSolver, ConstraintSolver, OutOfRange, SolverCfg, Synthesizer, TraceCfg,
    };
    pub use crate::visual::{NoopVisualizer, Style, TracingVisualizer, Visualizer};
    pub use nalgebra::Vector2 as Vec2;
}

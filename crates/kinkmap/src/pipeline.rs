//! Boundary → label: optional inversion, synthesis, labeling.
//!
//! Also hosts the positive-example generator used to sanity-check a labeler
//! before a long enumeration.

use std::sync::Arc;

use nalgebra::Vector2;

use crate::error::{KinkError, Result};
use crate::geom::{invert, trace_to_boundary, Boundary, GridDims, ParamBox, Trace};
use crate::oracle::Labeler;
use crate::synth::{ConstraintSolver, Synthesizer};
use crate::visual::{NoopVisualizer, Style, Visualizer};

/// Everything needed to label one boundary.
pub struct LabelPipeline<S> {
    pub synth: Synthesizer<S>,
    pub labeler: Arc<dyn Labeler>,
    pub pbox: ParamBox,
    /// Rotate the boundary by 180° in `pbox` before synthesis.
    pub invert: bool,
    pub visualizer: Arc<dyn Visualizer>,
}

impl<S: ConstraintSolver> LabelPipeline<S> {
    pub fn new(synth: Synthesizer<S>, labeler: Arc<dyn Labeler>, pbox: ParamBox) -> Self {
        Self {
            synth,
            labeler,
            pbox,
            invert: false,
            visualizer: Arc::new(NoopVisualizer),
        }
    }

    /// Parameter box taken from the grid's x-extent and the state bounds.
    pub fn for_grid(synth: Synthesizer<S>, labeler: Arc<dyn Labeler>, dims: &GridDims) -> Self {
        let pbox = ParamBox {
            x: (0.0, dims.x_max()),
            y: (synth.cfg.state_min, synth.cfg.state_max),
        };
        Self::new(synth, labeler, pbox)
    }

    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    pub fn with_visualizer(mut self, v: Arc<dyn Visualizer>) -> Self {
        self.visualizer = v;
        self
    }

    /// Traces always run over `[0, pbox.x.1]`.
    #[inline]
    pub fn horizon(&self) -> f64 {
        self.pbox.x.1
    }

    /// Run-level checks: synthesis parameters and labeler domain.
    pub fn validate(&self) -> Result<()> {
        self.synth.cfg.validate()?;
        self.labeler.check_domain(0.0, self.horizon())
    }

    /// Synthesize and label; per-boundary failures come back as `Err`.
    pub fn label(&self, boundary: &Boundary) -> Result<(Trace, bool)> {
        let target = if self.invert {
            invert(boundary, &self.pbox)
        } else {
            boundary.clone()
        };
        self.visualizer.draw(target.points(), Style::Boundary);
        let trace = self.synth.synthesize(&target, self.horizon())?;
        self.visualizer.draw(trace.points(), Style::Trace);
        let verdict = self.labeler.classify(&trace);
        Ok((trace, verdict))
    }
}

/// Slope and intercept of the reference positive line.
const POSITIVE_SLOPE: f64 = -0.03;
const POSITIVE_INTERCEPT: f64 = 0.75;
const POSITIVE_SAMPLES: usize = 201;

/// Sample `y = -0.03 x + 0.75` densely over the box, simplify it to a
/// boundary, keep the points inside the box, and confirm the pipeline labels
/// it positive.
pub fn positive_example<S: ConstraintSolver>(pipeline: &LabelPipeline<S>) -> Result<Boundary> {
    let pbox = pipeline.pbox;
    let last = (POSITIVE_SAMPLES - 1) as f64;
    let samples: Vec<Vector2<f64>> = (0..POSITIVE_SAMPLES)
        .map(|i| {
            let x = (pbox.x.1 - pbox.x.0) * (i as f64 / last) + pbox.x.0;
            Vector2::new(x, POSITIVE_SLOPE * x + POSITIVE_INTERCEPT)
        })
        .collect();
    let dense = trace_to_boundary(&samples, 1e-9)?;
    let inside: Vec<Vector2<f64>> = dense
        .points()
        .iter()
        .copied()
        .filter(|&p| pbox.contains(p))
        .collect();
    if inside.is_empty() {
        return Err(KinkError::invalid("positive line leaves the parameter box"));
    }
    let boundary = Boundary::new(inside)?;
    let (_, verdict) = pipeline.label(&boundary)?;
    if !verdict {
        return Err(KinkError::invalid(format!(
            "generated positive example is labeled negative by '{}'",
            pipeline.labeler.name()
        )));
    }
    tracing::debug!(points = boundary.len(), "positive example accepted");
    Ok(boundary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{Envelope, FnLabeler, PolygonOracle};
    use crate::synth::{SolverCfg, TraceCfg};

    fn canonical_pipeline() -> LabelPipeline<crate::synth::ChainSolver> {
        LabelPipeline::new(
            Synthesizer::new(TraceCfg::default(), SolverCfg::default()),
            Arc::new(PolygonOracle::new(Envelope::canonical())),
            ParamBox::canonical(),
        )
    }

    #[test]
    fn descending_segment_labels_positive() {
        let p = canonical_pipeline();
        let b = Boundary::from_pairs(&[(0.0, 0.75), (20.0, 0.15)]).unwrap();
        let (trace, verdict) = p.label(&b).unwrap();
        assert_eq!(trace.len(), 200);
        assert!(verdict);
    }

    #[test]
    fn inversion_flips_the_verdict_for_the_reference_line() {
        // inverted: (0, 0.85) -> (20, 0.25); ends above upper(20) = 0.2
        let p = canonical_pipeline().with_invert(true);
        let b = Boundary::from_pairs(&[(0.0, 0.75), (20.0, 0.15)]).unwrap();
        let (_, verdict) = p.label(&b).unwrap();
        assert!(!verdict);
    }

    #[test]
    fn positive_example_is_a_single_segment() {
        let p = canonical_pipeline();
        let b = positive_example(&p).unwrap();
        assert_eq!(b.len(), 2);
        let (x0, x1) = b.x_range();
        assert!(x0.abs() < 1e-12 && (x1 - 20.0).abs() < 1e-12);
    }

    #[test]
    fn positive_example_fails_loudly_for_a_hostile_labeler() {
        let p = LabelPipeline::new(
            Synthesizer::new(TraceCfg::default(), SolverCfg::default()),
            Arc::new(FnLabeler::new("never", |_t: &Trace| false)),
            ParamBox::canonical(),
        );
        assert!(matches!(positive_example(&p), Err(KinkError::InvalidParams(_))));
    }

    #[test]
    fn validate_rejects_short_envelope() {
        let env = Envelope::new(&[(0.0, 1.0), (10.0, 1.0)], &[(0.0, 0.0), (20.0, 0.0)]).unwrap();
        let p = LabelPipeline::new(
            Synthesizer::new(TraceCfg::default(), SolverCfg::default()),
            Arc::new(PolygonOracle::new(env)),
            ParamBox::canonical(),
        );
        assert!(matches!(p.validate(), Err(KinkError::MalformedEnvelope(_))));
    }
}

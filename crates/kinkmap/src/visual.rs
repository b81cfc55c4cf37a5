//! Visualization hook.
//!
//! The core only ever pushes point sequences into a `Visualizer`; nothing is
//! read back. Headless runs use `NoopVisualizer`.

use nalgebra::Vector2;

/// What is being drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Style {
    Boundary,
    Trace,
}

pub trait Visualizer: Send + Sync {
    fn draw(&self, pts: &[Vector2<f64>], style: Style);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopVisualizer;

impl Visualizer for NoopVisualizer {
    fn draw(&self, _pts: &[Vector2<f64>], _style: Style) {}
}

/// Emits each drawing as a `trace`-level event (x and y vectors).
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingVisualizer;

impl Visualizer for TracingVisualizer {
    fn draw(&self, pts: &[Vector2<f64>], style: Style) {
        let xs: Vec<f64> = pts.iter().map(|p| p.x).collect();
        let ys: Vec<f64> = pts.iter().map(|p| p.y).collect();
        tracing::trace!(?style, n = pts.len(), ?xs, ?ys, "draw");
    }
}

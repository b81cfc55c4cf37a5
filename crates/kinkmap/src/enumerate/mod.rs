//! Grid enumeration: every discretized boundary with exactly `n` kinks.
//!
//! Canonical form
//! - Points have non-decreasing x-index, start at x-index 0 and end at
//!   `num_x`; y-indices range over `0..=num_y`. Two points sharing an x-index
//!   form a vertical jump.
//! - Every interior point is a genuine kink (integer cross product ≠ 0), so a
//!   polyline has exactly one representation and `n` kinks means `n + 2`
//!   points. This is what makes the enumeration duplicate-free. Repeated
//!   points and a third point in one column are collinear, so each column
//!   holds at most two points and `n ≤ 2 * num_x`.
//!
//! Search
//! - Depth-first over positions with an explicit stack, lexicographic in
//!   `(x, y)` per position. A candidate is pruned as soon as it makes its
//!   predecessor collinear; a column that already holds two points is skipped.
//! - The iterator is lazy, `Clone` and `Send`; re-creating it restarts.
//!
//! Code cross-refs: `geom::GridBoundary`, `pipeline::LabelPipeline`, `driver`.

mod sample;

pub use sample::{sample_grid_boundary, ReplayToken};

use serde::{Deserialize, Serialize};

use crate::error::{KinkError, Result};
use crate::geom::{grid_to_param, GridBoundary, GridDims, EPS_X};
use crate::pipeline::LabelPipeline;
use crate::synth::ConstraintSolver;

/// Lazy, duplicate-free enumeration of grid boundaries with exactly `kinks` kinks.
#[derive(Clone, Debug)]
pub struct GridBoundaries {
    num_x: u32,
    num_y: u32,
    len: usize,
    path: Vec<(u32, u32)>,
    /// Next candidate to try at depth `path.len()`; `None` starts from the
    /// lowest admissible x.
    pending: Option<(u32, u32)>,
    done: bool,
}

impl GridBoundaries {
    pub fn new(dims: &GridDims, kinks: usize) -> Self {
        Self {
            num_x: dims.num_x,
            num_y: dims.num_y,
            len: kinks + 2,
            path: Vec::with_capacity(kinks + 2),
            pending: None,
            done: kinks > dims.max_kinks(),
        }
    }

    /// Admissible x-range for depth `d`, given the current prefix.
    fn x_bounds(&self, d: usize) -> (u32, u32) {
        if d == 0 {
            (0, 0)
        } else if d + 1 == self.len {
            (self.num_x, self.num_x)
        } else {
            let prev = self.path[d - 1].0;
            // a third point in one column is always collinear
            let full = d >= 2 && self.path[d - 2].0 == prev;
            (if full { prev + 1 } else { prev }, self.num_x)
        }
    }

    fn admissible(&self, d: usize, p: (u32, u32)) -> bool {
        d < 2 || !crate::geom::collinear_idx(self.path[d - 2], self.path[d - 1], p)
    }

    /// First admissible candidate at depth `d`, at or after `from`.
    fn scan_from(&self, d: usize, from: Option<(u32, u32)>) -> Option<(u32, u32)> {
        let (lo, hi) = self.x_bounds(d);
        let (mut x, mut y) = match from {
            Some((x, y)) if x >= lo => (x, y),
            _ => (lo, 0),
        };
        while x <= hi {
            while y <= self.num_y {
                if self.admissible(d, (x, y)) {
                    return Some((x, y));
                }
                y += 1;
            }
            x += 1;
            y = 0;
        }
        None
    }

    #[inline]
    fn successor(&self, p: (u32, u32)) -> (u32, u32) {
        if p.1 < self.num_y {
            (p.0, p.1 + 1)
        } else {
            (p.0 + 1, 0)
        }
    }
}

impl Iterator for GridBoundaries {
    type Item = GridBoundary;

    fn next(&mut self) -> Option<GridBoundary> {
        if self.done {
            return None;
        }
        loop {
            let d = self.path.len();
            let from = self.pending.take();
            match self.scan_from(d, from) {
                Some(p) => {
                    self.path.push(p);
                    if self.path.len() == self.len {
                        let out = GridBoundary::new(self.path.clone());
                        self.path.pop();
                        self.pending = Some(self.successor(p));
                        return Some(out);
                    }
                }
                None => match self.path.pop() {
                    Some(q) => self.pending = Some(self.successor(q)),
                    None => {
                        self.done = true;
                        return None;
                    }
                },
            }
        }
    }
}

/// A labeled grid boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    pub boundary: GridBoundary,
    pub kinks: usize,
    pub label: bool,
}

/// Per-boundary result: a record, or the reason it was excluded.
pub type BoundaryOutcome = std::result::Result<ClassificationRecord, (GridBoundary, KinkError)>;

/// Convert, synthesize and label one grid boundary.
pub fn label_grid_boundary<S: ConstraintSolver>(
    gb: GridBoundary,
    dims: &GridDims,
    pipeline: &LabelPipeline<S>,
) -> BoundaryOutcome {
    let boundary = match grid_to_param(&gb, dims) {
        Ok(b) => b,
        Err(err) => return Err((gb, err)),
    };
    match pipeline.label(&boundary) {
        Ok((_, label)) => Ok(ClassificationRecord {
            kinks: gb.kinks(),
            boundary: gb,
            label,
        }),
        Err(err) => Err((gb, err)),
    }
}

/// Run-level checks shared by every labeled enumeration: grid dimensions,
/// trace horizon against the grid width, synthesis parameters and envelope
/// coverage.
pub(crate) fn check_run<S: ConstraintSolver>(
    dims: &GridDims,
    pipeline: &LabelPipeline<S>,
) -> Result<()> {
    dims.validate()?;
    if (pipeline.horizon() - dims.x_max()).abs() > EPS_X {
        return Err(KinkError::InvalidGridDims(format!(
            "grid spans x in [0, {}] but traces run over [0, {}]",
            dims.x_max(),
            pipeline.horizon()
        )));
    }
    pipeline.validate()
}

/// Every grid boundary with `kinks` kinks together with its outcome.
///
/// Run-level problems (`InvalidGridDims`, `MalformedEnvelope`,
/// `InvalidParams`) are returned before anything is enumerated.
pub fn enumerate_outcomes<'a, S: ConstraintSolver>(
    kinks: usize,
    dims: &'a GridDims,
    pipeline: &'a LabelPipeline<S>,
) -> Result<impl Iterator<Item = BoundaryOutcome> + 'a> {
    check_run(dims, pipeline)?;
    Ok(GridBoundaries::new(dims, kinks).map(move |gb| label_grid_boundary(gb, dims, pipeline)))
}

/// Labeled boundaries with `kinks` kinks; boundaries without a realizable
/// trace are skipped (and logged at debug level).
pub fn enumerate<'a, S: ConstraintSolver>(
    kinks: usize,
    dims: &'a GridDims,
    pipeline: &'a LabelPipeline<S>,
) -> Result<impl Iterator<Item = ClassificationRecord> + 'a> {
    Ok(enumerate_outcomes(kinks, dims, pipeline)?.filter_map(|outcome| match outcome {
        Ok(rec) => Some(rec),
        Err((gb, err)) => {
            tracing::debug!(boundary = ?gb.pts, %err, "skipping boundary");
            None
        }
    }))
}

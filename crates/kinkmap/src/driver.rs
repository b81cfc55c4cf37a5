//! Classification driver: kink counts `0..=max_kinks`, one artefact per run.
//!
//! Concurrency
//! - Each kink pass bridges the lazy enumerator into a rayon pool
//!   (`par_bridge`); workers share only read-only configuration.
//! - Outcomes are collected per pass and merged into a `BTreeMap` keyed by
//!   boundary, so worker scheduling never changes the artefact.
//! - `CancelToken` is polled between boundaries; an in-flight solve finishes.
//! - Labelers that are not `parallel_safe` (interactive prompts) run on the
//!   calling thread.
//!
//! Errors
//! - Run-level (`InvalidGridDims`, `MalformedEnvelope`, `InvalidParams`,
//!   `Cancelled`) abort and are returned.
//! - Per-boundary errors are tallied in `RunStats` and the boundary is left
//!   out of the artefact.

use std::collections::BTreeMap;
use std::ops::AddAssign;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::enumerate::{
    check_run, label_grid_boundary, BoundaryOutcome, ClassificationRecord, GridBoundaries,
};
use crate::error::{KinkError, Result};
use crate::geom::{GridBoundary, GridDims};
use crate::pipeline::LabelPipeline;
use crate::synth::ConstraintSolver;

/// Driver configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyCfg {
    /// Highest kink count to enumerate (inclusive). Passes beyond
    /// `GridDims::max_kinks` are empty and skipped.
    pub max_kinks: usize,
    /// Worker threads; `None` uses rayon's global pool.
    pub threads: Option<usize>,
}

/// Shared cancellation flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Outcome tallies for one pass or a whole run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub labeled: usize,
    pub positives: usize,
    pub infeasible: usize,
    pub timed_out: usize,
    pub invalid: usize,
}

impl RunStats {
    /// Count one boundary outcome.
    pub fn absorb(&mut self, outcome: &BoundaryOutcome) {
        match outcome {
            Ok(rec) => {
                self.labeled += 1;
                if rec.label {
                    self.positives += 1;
                }
            }
            Err((_, KinkError::Unsatisfiable { .. })) => self.infeasible += 1,
            Err((_, KinkError::SolverTimeout { .. })) => self.timed_out += 1,
            Err(_) => self.invalid += 1,
        }
    }

    pub fn skipped(&self) -> usize {
        self.infeasible + self.timed_out + self.invalid
    }
}

impl AddAssign for RunStats {
    fn add_assign(&mut self, rhs: Self) {
        self.labeled += rhs.labeled;
        self.positives += rhs.positives;
        self.infeasible += rhs.infeasible;
        self.timed_out += rhs.timed_out;
        self.invalid += rhs.invalid;
    }
}

/// Result artefact of one run over one grid configuration.
///
/// Lookup by boundary, iteration in boundary order, grouping by kink count.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "ArtefactDoc", from = "ArtefactDoc")]
pub struct ClassificationMap {
    pub dims: GridDims,
    pub max_kinks: usize,
    labels: BTreeMap<GridBoundary, bool>,
    stats: BTreeMap<usize, RunStats>,
}

impl ClassificationMap {
    pub fn new(dims: GridDims, max_kinks: usize) -> Self {
        Self {
            dims,
            max_kinks,
            labels: BTreeMap::new(),
            stats: BTreeMap::new(),
        }
    }

    /// Append a record; returns `false` if the boundary was already present
    /// (the first label is kept).
    pub fn insert(&mut self, rec: ClassificationRecord) -> bool {
        match self.labels.entry(rec.boundary) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(v) => {
                v.insert(rec.label);
                true
            }
        }
    }

    #[inline]
    pub fn get(&self, gb: &GridBoundary) -> Option<bool> {
        self.labels.get(gb).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = ClassificationRecord> + '_ {
        self.labels.iter().map(|(gb, &label)| ClassificationRecord {
            kinks: gb.kinks(),
            boundary: gb.clone(),
            label,
        })
    }

    pub fn records_with_kinks(&self, kinks: usize) -> impl Iterator<Item = ClassificationRecord> + '_ {
        self.records().filter(move |r| r.kinks == kinks)
    }

    pub fn positives(&self) -> usize {
        self.labels.values().filter(|&&l| l).count()
    }

    pub fn stats_for(&self, kinks: usize) -> Option<RunStats> {
        self.stats.get(&kinks).copied()
    }

    pub fn total_stats(&self) -> RunStats {
        let mut total = RunStats::default();
        for s in self.stats.values() {
            total += *s;
        }
        total
    }
}

/// Flat serialized form of `ClassificationMap`.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct ArtefactDoc {
    dims: GridDims,
    max_kinks: usize,
    stats: BTreeMap<usize, RunStats>,
    records: Vec<ClassificationRecord>,
}

impl From<ClassificationMap> for ArtefactDoc {
    fn from(map: ClassificationMap) -> Self {
        let records = map.records().collect();
        Self {
            dims: map.dims,
            max_kinks: map.max_kinks,
            stats: map.stats,
            records,
        }
    }
}

impl From<ArtefactDoc> for ClassificationMap {
    fn from(doc: ArtefactDoc) -> Self {
        let mut map = ClassificationMap::new(doc.dims, doc.max_kinks);
        map.stats = doc.stats;
        for rec in doc.records {
            map.insert(rec);
        }
        map
    }
}

/// Run one kink pass and return its outcomes (order unspecified).
fn run_pass<S: ConstraintSolver>(
    kinks: usize,
    dims: &GridDims,
    pipeline: &LabelPipeline<S>,
    cancel: &CancelToken,
    parallel: bool,
) -> Vec<BoundaryOutcome> {
    let label = |gb: GridBoundary| -> Option<BoundaryOutcome> {
        if cancel.is_cancelled() {
            return None;
        }
        Some(label_grid_boundary(gb, dims, pipeline))
    };
    let boundaries = GridBoundaries::new(dims, kinks);
    if parallel {
        boundaries.par_bridge().filter_map(label).collect()
    } else {
        boundaries.map_while(label).collect()
    }
}

/// Enumerate and label every grid boundary with up to `cfg.max_kinks` kinks.
pub fn classify_all<S: ConstraintSolver>(
    dims: &GridDims,
    cfg: &ClassifyCfg,
    pipeline: &LabelPipeline<S>,
    cancel: &CancelToken,
) -> Result<ClassificationMap> {
    check_run(dims, pipeline)?;
    let state_max = pipeline.synth.cfg.state_max;
    if dims.y_max() > state_max {
        tracing::info!(
            y_max = dims.y_max(),
            state_max,
            "grid rows above the state box yield unsatisfiable boundaries"
        );
    }

    let parallel = pipeline.labeler.parallel_safe();
    let pool = match cfg.threads {
        Some(n) if parallel => Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| KinkError::invalid(format!("thread pool: {e}")))?,
        ),
        _ => None,
    };

    let last = cfg.max_kinks.min(dims.max_kinks());
    if last < cfg.max_kinks {
        tracing::info!(
            requested = cfg.max_kinks,
            effective = last,
            "kink counts above 2 * num_x have no boundaries"
        );
    }

    let mut map = ClassificationMap::new(*dims, cfg.max_kinks);
    for kinks in 0..=last {
        let outcomes = match &pool {
            Some(pool) => pool.install(|| run_pass(kinks, dims, pipeline, cancel, parallel)),
            None => run_pass(kinks, dims, pipeline, cancel, parallel),
        };
        if cancel.is_cancelled() {
            tracing::warn!(kinks, done = outcomes.len(), "classification cancelled");
            return Err(KinkError::Cancelled);
        }
        let mut stats = RunStats::default();
        for outcome in outcomes {
            stats.absorb(&outcome);
            match outcome {
                Ok(rec) => {
                    map.insert(rec);
                }
                Err((gb, err @ KinkError::SolverTimeout { .. })) => {
                    tracing::warn!(boundary = ?gb.pts, %err, "solver timeout");
                }
                Err((gb, err)) => {
                    tracing::debug!(boundary = ?gb.pts, %err, "boundary skipped");
                }
            }
        }
        tracing::info!(
            kinks,
            labeled = stats.labeled,
            positives = stats.positives,
            infeasible = stats.infeasible,
            timed_out = stats.timed_out,
            invalid = stats.invalid,
            "kink pass done"
        );
        map.stats.insert(kinks, stats);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{Envelope, FnLabeler, PolygonOracle, PromptLabeler};
    use crate::synth::{SolverCfg, Synthesizer, TraceCfg};
    use crate::geom::{ParamBox, Trace};
    use std::io::Cursor;
    use std::time::Duration;

    fn dims() -> GridDims {
        GridDims {
            x_spacing: 5.0,
            num_x: 4,
            y_spacing: 0.125,
            num_y: 8,
        }
    }

    fn pipeline(trace: TraceCfg, solver: SolverCfg) -> LabelPipeline<crate::synth::ChainSolver> {
        LabelPipeline::new(
            Synthesizer::new(trace, solver),
            Arc::new(PolygonOracle::new(Envelope::canonical())),
            ParamBox::canonical(),
        )
    }

    fn small_trace() -> TraceCfg {
        TraceCfg {
            num_points: 41,
            ..TraceCfg::default()
        }
    }

    #[test]
    fn artefact_covers_every_kink_pass() {
        let p = pipeline(small_trace(), SolverCfg::default());
        let cfg = ClassifyCfg {
            max_kinks: 2,
            threads: Some(2),
        };
        let map = classify_all(&dims(), &cfg, &p, &CancelToken::new()).unwrap();
        let expected: usize = (0..=2).map(|n| GridBoundaries::new(&dims(), n).count()).sum();
        assert_eq!(map.len(), expected);
        assert_eq!(map.total_stats().labeled, expected);
        assert_eq!(map.total_stats().skipped(), 0);
        for n in 0..=2 {
            let s = map.stats_for(n).unwrap();
            assert_eq!(s.labeled, map.records_with_kinks(n).count());
        }
        let pos = GridBoundary::new(vec![(0, 6), (2, 4), (4, 1)]);
        assert_eq!(map.get(&pos), Some(true));
        assert_eq!(map.positives(), map.total_stats().positives);
    }

    #[test]
    fn parallel_and_sequential_runs_agree() {
        let p = pipeline(small_trace(), SolverCfg::default());
        let par = classify_all(
            &dims(),
            &ClassifyCfg {
                max_kinks: 1,
                threads: Some(4),
            },
            &p,
            &CancelToken::new(),
        )
        .unwrap();
        let seq = classify_all(
            &dims(),
            &ClassifyCfg {
                max_kinks: 1,
                threads: Some(1),
            },
            &p,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(par, seq);
    }

    #[test]
    fn kink_bound_is_capped_by_grid_width() {
        let d = GridDims {
            x_spacing: 10.0,
            num_x: 2,
            y_spacing: 0.5,
            num_y: 2,
        };
        let p = pipeline(small_trace(), SolverCfg::default());
        let map = classify_all(
            &d,
            &ClassifyCfg {
                max_kinks: 5,
                threads: None,
            },
            &p,
            &CancelToken::new(),
        )
        .unwrap();
        // two points per column: at most 2 * num_x kinks
        assert!(map.stats_for(4).unwrap().labeled > 0);
        assert!(map.stats_for(5).is_none());
        assert_eq!(map.max_kinks, 5);
    }

    #[test]
    fn run_level_errors_abort() {
        let p = pipeline(small_trace(), SolverCfg::default());
        let cfg = ClassifyCfg {
            max_kinks: 1,
            threads: None,
        };
        let mut bad = dims();
        bad.num_y = 0;
        assert!(matches!(
            classify_all(&bad, &cfg, &p, &CancelToken::new()),
            Err(KinkError::InvalidGridDims(_))
        ));
        // grid wider than the trace horizon
        let mut wide = dims();
        wide.x_spacing = 6.0;
        assert!(matches!(
            classify_all(&wide, &cfg, &p, &CancelToken::new()),
            Err(KinkError::InvalidGridDims(_))
        ));
        let env = Envelope::new(&[(0.0, 1.0), (15.0, 1.0)], &[(0.0, 0.0), (20.0, 0.0)]).unwrap();
        let short = LabelPipeline::new(
            Synthesizer::new(small_trace(), SolverCfg::default()),
            Arc::new(PolygonOracle::new(env)),
            ParamBox::canonical(),
        );
        assert!(matches!(
            classify_all(&dims(), &cfg, &short, &CancelToken::new()),
            Err(KinkError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn timeouts_are_counted_separately() {
        let p = pipeline(
            small_trace(),
            SolverCfg {
                timeout: Some(Duration::ZERO),
                ..SolverCfg::default()
            },
        );
        let cfg = ClassifyCfg {
            max_kinks: 0,
            threads: None,
        };
        let map = classify_all(&dims(), &cfg, &p, &CancelToken::new()).unwrap();
        let s = map.stats_for(0).unwrap();
        assert_eq!(s.timed_out, 81);
        assert_eq!(s.infeasible, 0);
        assert!(map.is_empty());
    }

    #[test]
    fn cancelled_runs_return_cancelled() {
        let p = pipeline(small_trace(), SolverCfg::default());
        let cancel = CancelToken::new();
        cancel.cancel();
        let cfg = ClassifyCfg {
            max_kinks: 1,
            threads: None,
        };
        assert_eq!(
            classify_all(&dims(), &cfg, &p, &cancel),
            Err(KinkError::Cancelled)
        );
    }

    #[test]
    fn any_labeler_plugs_in() {
        let ends_low = FnLabeler::new("ends-low", |t: &Trace| {
            t.points().last().is_some_and(|p| p.y < 0.5)
        });
        let p = LabelPipeline::new(
            Synthesizer::new(small_trace(), SolverCfg::default()),
            Arc::new(ends_low),
            ParamBox::canonical(),
        );
        let cfg = ClassifyCfg {
            max_kinks: 0,
            threads: None,
        };
        let map = classify_all(&dims(), &cfg, &p, &CancelToken::new()).unwrap();
        // end y in {0, .125, .25, .375} of 9 values, for each of 9 starts
        assert_eq!(map.positives(), 36);
    }

    #[test]
    fn interactive_labeler_runs_sequentially() {
        let d = GridDims {
            x_spacing: 20.0,
            num_x: 1,
            y_spacing: 1.0,
            num_y: 1,
        };
        let answers = Cursor::new(b"y\nn\ny\nn\n".to_vec());
        let p = LabelPipeline::new(
            Synthesizer::new(small_trace(), SolverCfg::default()),
            Arc::new(PromptLabeler::new(answers, std::io::sink())),
            ParamBox::canonical(),
        );
        let cfg = ClassifyCfg {
            max_kinks: 0,
            threads: Some(4),
        };
        let map = classify_all(&d, &cfg, &p, &CancelToken::new()).unwrap();
        assert_eq!(map.len(), 4);
        assert_eq!(map.positives(), 2);
        // lexicographic enumeration order: (0,0)-(1,0) is asked first
        assert_eq!(map.get(&GridBoundary::new(vec![(0, 0), (1, 0)])), Some(true));
        assert_eq!(map.get(&GridBoundary::new(vec![(0, 0), (1, 1)])), Some(false));
    }

    #[test]
    fn insert_keeps_first_label() {
        let mut map = ClassificationMap::new(dims(), 0);
        let gb = GridBoundary::new(vec![(0, 0), (4, 0)]);
        assert!(map.insert(ClassificationRecord {
            boundary: gb.clone(),
            kinks: 0,
            label: true
        }));
        assert!(!map.insert(ClassificationRecord {
            boundary: gb.clone(),
            kinks: 0,
            label: false
        }));
        assert_eq!(map.get(&gb), Some(true));
    }
}

//! Run configuration: JSON file and command-line flags, flags winning.
//!
//! Grid dimensions have no defaults; all four values must come from one of
//! the two sources.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use kinkmap::prelude::*;
use serde::{Deserialize, Serialize};

/// Everything a run can be configured with. Every field is optional so the
/// file and the flags can each supply part of it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub x_spacing: Option<f64>,
    pub num_x: Option<u32>,
    pub y_spacing: Option<f64>,
    pub num_y: Option<u32>,
    pub max_kinks: Option<usize>,
    pub epsilon: Option<f64>,
    pub num_points: Option<usize>,
    pub rate_bound: Option<f64>,
    pub timeout_ms: Option<u64>,
    pub threads: Option<usize>,
    pub invert: Option<bool>,
    pub pointwise_lower: Option<bool>,
    pub envelope: Option<EnvelopeSpec>,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_slice(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    /// Fields set in `over` replace those in `self`.
    pub fn overlay(self, over: RunConfig) -> RunConfig {
        RunConfig {
            x_spacing: over.x_spacing.or(self.x_spacing),
            num_x: over.num_x.or(self.num_x),
            y_spacing: over.y_spacing.or(self.y_spacing),
            num_y: over.num_y.or(self.num_y),
            max_kinks: over.max_kinks.or(self.max_kinks),
            epsilon: over.epsilon.or(self.epsilon),
            num_points: over.num_points.or(self.num_points),
            rate_bound: over.rate_bound.or(self.rate_bound),
            timeout_ms: over.timeout_ms.or(self.timeout_ms),
            threads: over.threads.or(self.threads),
            invert: over.invert.or(self.invert),
            pointwise_lower: over.pointwise_lower.or(self.pointwise_lower),
            envelope: over.envelope.or(self.envelope),
        }
    }

    pub fn grid(&self) -> Result<GridDims> {
        let (Some(x_spacing), Some(num_x), Some(y_spacing), Some(num_y)) =
            (self.x_spacing, self.num_x, self.y_spacing, self.num_y)
        else {
            let missing: Vec<&str> = [
                ("x_spacing", self.x_spacing.is_none()),
                ("num_x", self.num_x.is_none()),
                ("y_spacing", self.y_spacing.is_none()),
                ("num_y", self.num_y.is_none()),
            ]
            .into_iter()
            .filter_map(|(name, absent)| absent.then_some(name))
            .collect();
            bail!("missing grid option(s): {}", missing.join(", "));
        };
        let dims = GridDims {
            x_spacing,
            num_x,
            y_spacing,
            num_y,
        };
        dims.validate()?;
        Ok(dims)
    }

    pub fn trace_cfg(&self) -> TraceCfg {
        let base = TraceCfg::default();
        TraceCfg {
            epsilon: self.epsilon.unwrap_or(base.epsilon),
            num_points: self.num_points.unwrap_or(base.num_points),
            rate_bound: self.rate_bound.or(base.rate_bound),
            ..base
        }
    }

    pub fn solver_cfg(&self) -> SolverCfg {
        SolverCfg {
            timeout: self.timeout_ms.map(Duration::from_millis),
            ..SolverCfg::default()
        }
    }

    pub fn envelope(&self) -> Result<Envelope> {
        match &self.envelope {
            Some(spec) => Ok(Envelope::from_spec(spec)?),
            None => Ok(Envelope::canonical()),
        }
    }

    pub fn oracle(&self) -> Result<PolygonOracle> {
        let policy = if self.pointwise_lower.unwrap_or(false) {
            LowerPolicy::Pointwise
        } else {
            LowerPolicy::Eventually
        };
        Ok(PolygonOracle::new(self.envelope()?).with_lower_policy(policy))
    }
}

/// Command-line flags mirroring `RunConfig`.
#[derive(Args, Clone, Debug, Default)]
pub struct RunFlags {
    /// JSON file with any of the options below
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,
    #[arg(long)]
    pub x_spacing: Option<f64>,
    #[arg(long)]
    pub num_x: Option<u32>,
    #[arg(long)]
    pub y_spacing: Option<f64>,
    #[arg(long)]
    pub num_y: Option<u32>,
    /// Tracking tolerance around the boundary
    #[arg(long)]
    pub epsilon: Option<f64>,
    /// Samples per trace
    #[arg(long)]
    pub num_points: Option<usize>,
    /// Bound on |x_{i+1} - x_i|
    #[arg(long)]
    pub rate_bound: Option<f64>,
    /// Per-solve budget in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    #[arg(long)]
    pub threads: Option<usize>,
    /// Rotate boundaries by 180° before synthesis
    #[arg(long)]
    pub invert: bool,
    /// Check the lower curve pointwise instead of eventually-above
    #[arg(long)]
    pub pointwise_lower: bool,
    /// JSON file with {"upper": [[x, y], ...], "lower": [[x, y], ...]}
    #[arg(long)]
    pub envelope: Option<std::path::PathBuf>,
}

impl RunFlags {
    /// Resolve file + flags into one config.
    pub fn resolve(&self) -> Result<RunConfig> {
        let base = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };
        let envelope = match &self.envelope {
            Some(path) => {
                let raw =
                    std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
                Some(
                    serde_json::from_slice::<EnvelopeSpec>(&raw)
                        .with_context(|| format!("parsing {}", path.display()))?,
                )
            }
            None => None,
        };
        Ok(base.overlay(RunConfig {
            x_spacing: self.x_spacing,
            num_x: self.num_x,
            y_spacing: self.y_spacing,
            num_y: self.num_y,
            max_kinks: None,
            epsilon: self.epsilon,
            num_points: self.num_points,
            rate_bound: self.rate_bound,
            timeout_ms: self.timeout_ms,
            threads: self.threads,
            invert: self.invert.then_some(true),
            pointwise_lower: self.pointwise_lower.then_some(true),
            envelope,
        }))
    }
}

mod config;
mod provenance;
mod table;

use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use kinkmap::prelude::*;
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use config::{RunConfig, RunFlags};
use provenance::Payload;

#[derive(Parser)]
#[command(name = "kinkmap-cli")]
#[command(about = "Enumerate and label piecewise-linear boundaries on a grid")]
struct Cmd {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    action: Action,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum LabelerKind {
    /// Envelope check against the configured polygon
    #[default]
    Polygon,
    /// Ask on stdin for every trace
    Human,
}

#[derive(Subcommand)]
enum Action {
    /// Label every grid boundary up to a kink count and write the artefact
    Classify {
        #[command(flatten)]
        run: RunFlags,
        #[arg(long)]
        max_kinks: Option<usize>,
        #[arg(long)]
        out: PathBuf,
        /// Also write a flat table (.csv or .parquet)
        #[arg(long)]
        table: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = LabelerKind::Polygon)]
        labeler: LabelerKind,
        /// Emit boundary and trace points as trace-level events
        #[arg(long)]
        trace_draws: bool,
    },
    /// Label randomly drawn boundaries with exactly `kinks` kinks
    Sample {
        #[command(flatten)]
        run: RunFlags,
        #[arg(long)]
        kinks: usize,
        #[arg(long, default_value_t = 10)]
        count: u64,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long)]
        out: PathBuf,
    },
    /// Print the reference positive boundary and confirm its label
    Positive {
        #[command(flatten)]
        run: RunFlags,
    },
    /// Per-kink totals of a table written by `classify --table`
    Summarize {
        #[arg(long)]
        table: PathBuf,
    },
    /// Print a small provenance JSON block
    Report,
}

fn main() -> Result<()> {
    let cmd = Cmd::parse();
    let default_level = if cmd.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match cmd.action {
        Action::Classify {
            run,
            max_kinks,
            out,
            table,
            labeler,
            trace_draws,
        } => classify(&run, max_kinks, &out, table.as_deref(), labeler, trace_draws),
        Action::Sample {
            run,
            kinks,
            count,
            seed,
            out,
        } => sample(&run, kinks, count, seed, &out),
        Action::Positive { run } => positive(&run),
        Action::Summarize { table } => summarize(&table),
        Action::Report => report(),
    }
}

fn build_labeler(kind: LabelerKind, cfg: &RunConfig) -> Result<Arc<dyn Labeler>> {
    Ok(match kind {
        LabelerKind::Polygon => Arc::new(cfg.oracle()?),
        LabelerKind::Human => Arc::new(PromptLabeler::new(
            BufReader::new(io::stdin()),
            io::stderr(),
        )),
    })
}

fn build_pipeline(
    cfg: &RunConfig,
    dims: &GridDims,
    labeler: Arc<dyn Labeler>,
    trace_draws: bool,
) -> LabelPipeline<ChainSolver> {
    let synth = Synthesizer::new(cfg.trace_cfg(), cfg.solver_cfg());
    let pipeline =
        LabelPipeline::for_grid(synth, labeler, dims).with_invert(cfg.invert.unwrap_or(false));
    if trace_draws {
        pipeline.with_visualizer(Arc::new(TracingVisualizer))
    } else {
        pipeline
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    std::fs::write(path, serde_json::to_vec_pretty(value)?)
        .with_context(|| format!("writing {}", path.display()))
}

fn classify(
    run: &RunFlags,
    max_kinks: Option<usize>,
    out: &Path,
    table: Option<&Path>,
    labeler: LabelerKind,
    trace_draws: bool,
) -> Result<()> {
    let cfg = run.resolve()?;
    let dims = cfg.grid()?;
    let max_kinks = max_kinks
        .or(cfg.max_kinks)
        .context("missing --max-kinks (or \"max_kinks\" in --config)")?;
    let pipeline = build_pipeline(&cfg, &dims, build_labeler(labeler, &cfg)?, trace_draws);
    let classify_cfg = ClassifyCfg {
        max_kinks,
        threads: cfg.threads,
    };
    tracing::info!(?dims, max_kinks, labeler = pipeline.labeler.name(), "classify");

    let map = classify_all(&dims, &classify_cfg, &pipeline, &CancelToken::new())?;
    write_json(out, &map)?;

    let mut extra = Vec::new();
    if let Some(path) = table {
        table::write_records(path, map.records())?;
        extra.push(path.to_path_buf());
    }

    let total = map.total_stats();
    tracing::info!(
        labeled = total.labeled,
        positives = total.positives,
        skipped = total.skipped(),
        out = %out.display(),
        "classification written"
    );
    let params = json!({ "config": cfg, "max_kinks": max_kinks, "labeler": format!("{labeler:?}") });
    provenance::write_sidecar(
        out,
        &extra,
        Payload::new("classify", params).with_summary(serde_json::to_value(total)?),
    )?;
    Ok(())
}

fn sample(run: &RunFlags, kinks: usize, count: u64, seed: u64, out: &Path) -> Result<()> {
    let cfg = run.resolve()?;
    let dims = cfg.grid()?;
    let pipeline = build_pipeline(&cfg, &dims, build_labeler(LabelerKind::Polygon, &cfg)?, false);
    pipeline.validate()?;

    let mut records = Vec::new();
    let mut stats = RunStats::default();
    for index in 0..count {
        let gb = sample_grid_boundary(&dims, kinks, ReplayToken { seed, index })?;
        let outcome = label_grid_boundary(gb, &dims, &pipeline);
        stats.absorb(&outcome);
        match outcome {
            Ok(rec) => records.push(rec),
            Err((gb, err)) if err.is_per_boundary() => {
                tracing::debug!(index, boundary = ?gb.pts, %err, "sample skipped");
            }
            Err((_, err)) => return Err(err.into()),
        }
    }
    tracing::info!(
        kinks,
        labeled = stats.labeled,
        positives = stats.positives,
        skipped = stats.skipped(),
        "sampling done"
    );

    write_json(
        out,
        &json!({ "dims": dims, "kinks": kinks, "seed": seed, "records": records }),
    )?;
    let params = json!({ "config": cfg, "kinks": kinks, "count": count, "seed": seed });
    provenance::write_sidecar(
        out,
        &[],
        Payload::new("sample", params).with_summary(serde_json::to_value(stats)?),
    )?;
    Ok(())
}

fn positive(run: &RunFlags) -> Result<()> {
    let cfg = run.resolve()?;
    let labeler: Arc<dyn Labeler> = Arc::new(cfg.oracle()?);
    let synth = Synthesizer::new(cfg.trace_cfg(), cfg.solver_cfg());
    // without grid options the canonical box is used
    let pipeline = if cfg.num_x.is_some() || cfg.x_spacing.is_some() {
        LabelPipeline::for_grid(synth, labeler, &cfg.grid()?)
    } else {
        LabelPipeline::new(synth, labeler, ParamBox::canonical())
    };
    let pipeline = pipeline.with_invert(cfg.invert.unwrap_or(false));
    pipeline.validate()?;
    let boundary = positive_example(&pipeline)?;
    let points: Vec<[f64; 2]> = boundary.points().iter().map(|p| [p.x, p.y]).collect();
    let obj = json!({
        "boundary": points,
        "kinks": kink_count(&boundary, 1e-9),
        "label": true,
    });
    println!("{}", serde_json::to_string_pretty(&obj)?);
    Ok(())
}

fn summarize(path: &Path) -> Result<()> {
    let df = table::summarize(path)?;
    println!("{df}");
    Ok(())
}

fn report() -> Result<()> {
    let obj = json!({
        "code_rev": provenance::current_git_rev(),
        "kinkmap_version": kinkmap::VERSION,
        "defaults": {
            "trace": {
                "epsilon": TraceCfg::default().epsilon,
                "num_points": TraceCfg::default().num_points,
            },
            "envelope": Envelope::canonical().to_spec(),
        },
    });
    println!("{}", serde_json::to_string_pretty(&obj)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn grid_flags() -> RunFlags {
        RunFlags {
            x_spacing: Some(5.0),
            num_x: Some(4),
            y_spacing: Some(0.125),
            num_y: Some(8),
            ..RunFlags::default()
        }
    }

    #[test]
    fn cli_parses_classify() {
        let cmd = Cmd::try_parse_from([
            "kinkmap-cli",
            "classify",
            "--x-spacing",
            "5",
            "--num-x",
            "4",
            "--y-spacing",
            "0.125",
            "--num-y",
            "8",
            "--max-kinks",
            "1",
            "--out",
            "map.json",
            "--invert",
        ])
        .unwrap();
        match cmd.action {
            Action::Classify {
                run,
                max_kinks,
                labeler,
                ..
            } => {
                assert_eq!(max_kinks, Some(1));
                assert_eq!(run.num_y, Some(8));
                assert!(run.invert);
                assert_eq!(labeler, LabelerKind::Polygon);
            }
            _ => panic!("expected classify"),
        }
    }

    #[test]
    fn classify_writes_artefact_table_and_sidecar() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("map.json");
        let table = dir.path().join("map.csv");
        classify(&grid_flags(), Some(1), &out, Some(&table), LabelerKind::Polygon, false).unwrap();
        assert!(out.exists() && table.exists());
        assert!(dir.path().join("map.provenance.json").exists());

        let map: ClassificationMap = serde_json::from_slice(&std::fs::read(&out).unwrap()).unwrap();
        assert_eq!(map.max_kinks, 1);
        assert_eq!(
            map.get(&GridBoundary::new(vec![(0, 5), (2, 3), (4, 1)])),
            None,
            "collinear points are not a canonical boundary"
        );
        assert_eq!(map.get(&GridBoundary::new(vec![(0, 5), (4, 1)])), Some(true));
    }

    #[test]
    fn classify_requires_a_kink_bound() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("map.json");
        let err = classify(&grid_flags(), None, &out, None, LabelerKind::Polygon, false)
            .unwrap_err()
            .to_string();
        assert!(err.contains("max-kinks"));
    }

    #[test]
    fn sample_is_reproducible() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");
        sample(&grid_flags(), 1, 5, 7, &a).unwrap();
        sample(&grid_flags(), 1, 5, 7, &b).unwrap();
        let read = |p: &Path| -> serde_json::Value {
            serde_json::from_slice(&std::fs::read(p).unwrap()).unwrap()
        };
        assert_eq!(read(&a)["records"], read(&b)["records"]);
    }
}

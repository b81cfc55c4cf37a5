//! Criterion benchmarks for grid boundary enumeration.
//! Focus sizes: num_x in {4, 6, 8} with num_y = 8, kinks in {0, 1, 2}.
//! Results: by default under target/criterion; to store under data/bench, run:
//!   CARGO_TARGET_DIR=data/bench cargo bench -p kinkmap

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use kinkmap::prelude::*;

fn dims(num_x: u32) -> GridDims {
    GridDims {
        x_spacing: 20.0 / f64::from(num_x),
        num_x,
        y_spacing: 0.125,
        num_y: 8,
    }
}

fn bench_enumerate(c: &mut Criterion) {
    let mut group = c.benchmark_group("enumerate");
    for &num_x in &[4u32, 6, 8] {
        for kinks in 0..=2usize {
            let id = format!("{num_x}x8/k{kinks}");
            group.bench_with_input(BenchmarkId::new("boundaries", id), &kinks, |b, &kinks| {
                let d = dims(num_x);
                b.iter(|| GridBoundaries::new(&d, kinks).count())
            });
        }
    }

    let d = dims(4);
    let trace = TraceCfg {
        num_points: 41,
        ..TraceCfg::default()
    };
    let pipeline = LabelPipeline::for_grid(
        Synthesizer::new(trace, SolverCfg::default()),
        Arc::new(PolygonOracle::new(Envelope::canonical())),
        &d,
    );
    group.bench_function("classify_4x8_k1", |b| {
        let cfg = ClassifyCfg {
            max_kinks: 1,
            threads: None,
        };
        b.iter(|| classify_all(&d, &cfg, &pipeline, &CancelToken::new()).map(|m| m.len()))
    });
    group.finish();
}

criterion_group!(benches, bench_enumerate);
criterion_main!(benches);

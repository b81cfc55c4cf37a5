use super::*;
use crate::error::KinkError;
use crate::geom::Trace;
use nalgebra::Vector2;
use std::io::Cursor;

fn trace_of(pairs: &[(f64, f64)]) -> Trace {
    Trace::from_points(pairs.iter().map(|&(x, y)| Vector2::new(x, y)).collect())
}

fn line_trace(y0: f64, slope: f64, n: usize) -> Trace {
    Trace::from_points(
        (0..n)
            .map(|i| {
                let x = 20.0 * (i as f64) / ((n - 1) as f64);
                Vector2::new(x, y0 + slope * x)
            })
            .collect(),
    )
}

#[test]
fn canonical_envelope_matches_segment_formulas() {
    let env = Envelope::canonical();
    // upper: y = -x/80 + 1 on [0,8), -x/20 + 13/10 on [8,14), -x/15 + 23/15 on [14,20]
    for x in [0.0, 3.0, 7.5] {
        assert!((env.upper.eval(x).unwrap() - (1.0 - x / 80.0)).abs() < 1e-12);
    }
    for x in [8.0, 10.0, 13.9] {
        assert!((env.upper.eval(x).unwrap() - (1.3 - x / 20.0)).abs() < 1e-12);
    }
    for x in [14.0, 17.0, 20.0] {
        assert!((env.upper.eval(x).unwrap() - (23.0 / 15.0 - x / 15.0)).abs() < 1e-12);
    }
    // lower: -x/25 + 0.5, -x/70 + 13/35, -x/80 + 7/20
    assert!((env.lower.eval(2.0).unwrap() - 0.42).abs() < 1e-12);
    assert!((env.lower.eval(5.0).unwrap() - 0.3).abs() < 1e-12);
    assert!((env.lower.eval(12.0).unwrap() - 0.2).abs() < 1e-12);
    assert!((env.lower.eval(20.0).unwrap() - 0.1).abs() < 1e-12);
    assert!(env.upper.eval(20.0001).is_none());
    assert!(env.lower.eval(-0.1).is_none());
}

#[test]
fn malformed_envelopes_are_rejected() {
    assert!(matches!(
        Envelope::new(&[(0.0, 1.0)], &[(0.0, 0.0), (20.0, 0.0)]),
        Err(KinkError::MalformedEnvelope(_))
    ));
    assert!(matches!(
        Envelope::new(&[(0.0, 1.0), (0.0, 0.5)], &[(0.0, 0.0), (20.0, 0.0)]),
        Err(KinkError::MalformedEnvelope(_))
    ));
    let short = Envelope::new(&[(0.0, 1.0), (10.0, 1.0)], &[(0.0, 0.0), (20.0, 0.0)]).unwrap();
    let err = PolygonOracle::new(short).check_domain(0.0, 20.0).unwrap_err();
    assert!(matches!(err, KinkError::MalformedEnvelope(_)));
    assert!(!err.is_per_boundary());
}

#[test]
fn envelope_spec_round_trips_anchors() {
    let env = Envelope::canonical();
    let back = Envelope::from_spec(&env.to_spec()).unwrap();
    assert_eq!(back, env);
}

#[test]
fn descending_line_is_positive() {
    let oracle = PolygonOracle::new(Envelope::canonical());
    assert!(oracle.classify(&line_trace(0.75, -0.03, 200)));
}

#[test]
fn single_breach_of_upper_is_negative() {
    let oracle = PolygonOracle::new(Envelope::canonical());
    let mut pts: Vec<Vector2<f64>> = line_trace(0.75, -0.03, 200).points().to_vec();
    // at x ≈ 15.08 the upper curve is ≈ 0.528
    pts[150].y = 0.6;
    let breached = Trace::from_points(pts);
    assert!(!oracle.upper_ok(&breached));
    assert!(oracle.lower_ok(&breached));
    assert!(!oracle.classify(&breached));
}

#[test]
fn upper_boundary_touch_is_allowed() {
    let oracle = PolygonOracle::new(Envelope::canonical());
    // interior anchors hit exactly; the final value stays clear of rounding
    let t = trace_of(&[(0.0, 1.0), (8.0, 0.9), (14.0, 0.6), (20.0, 0.19)]);
    assert!(oracle.upper_ok(&t));
}

#[test]
fn lower_dip_recovered_later_passes() {
    let oracle = PolygonOracle::new(Envelope::canonical());
    // dips below lower(5) = 0.3 at x=5, recovers to 0.35 at x=10
    let t = trace_of(&[(0.0, 0.6), (5.0, 0.1), (10.0, 0.35), (15.0, 0.3), (20.0, 0.15)]);
    assert!(oracle.upper_ok(&t));
    assert!(oracle.lower_ok(&t));
    assert!(oracle.classify(&t));
    let pointwise = oracle.clone().with_lower_policy(LowerPolicy::Pointwise);
    assert!(!pointwise.lower_ok(&t));
}

#[test]
fn lower_dip_never_recovered_fails() {
    let oracle = PolygonOracle::new(Envelope::canonical());
    // from x=10 on the trace stays at 0.05 < lower(10..20) >= 0.1
    let t = trace_of(&[(0.0, 0.6), (5.0, 0.4), (10.0, 0.05), (15.0, 0.05), (20.0, 0.05)]);
    assert!(!oracle.lower_ok(&t));
    assert!(!oracle.classify(&t));
}

#[test]
fn recovery_must_come_later_not_earlier() {
    let oracle = PolygonOracle::new(Envelope::canonical());
    // high early sample must not rescue the final dip (∀i ∃j≥i, not ∃j ∀i)
    let t = trace_of(&[(0.0, 0.9), (10.0, 0.5), (20.0, 0.05)]);
    assert!(!oracle.lower_ok(&t));
}

#[test]
fn fn_labeler_wraps_closures() {
    let always = FnLabeler::new("always", |_t: &Trace| true);
    let ends_high = FnLabeler::new("ends-high", |t: &Trace| {
        t.points().last().is_some_and(|p| p.y > 0.5)
    });
    let t = line_trace(0.75, -0.03, 10);
    assert!(always.classify(&t));
    assert!(!ends_high.classify(&t));
    assert_eq!(ends_high.name(), "ends-high");
    assert!(always.check_domain(-1e9, 1e9).is_ok());
}

#[test]
fn prompt_labeler_reads_answers() {
    let input = Cursor::new(b"maybe\ny\nno\n".to_vec());
    let labeler = PromptLabeler::new(input, Vec::<u8>::new());
    let t = line_trace(0.75, -0.03, 5);
    assert!(labeler.classify(&t));
    assert!(!labeler.classify(&t));
    // input exhausted
    assert!(!labeler.classify(&t));
    assert!(!labeler.parallel_safe());
}

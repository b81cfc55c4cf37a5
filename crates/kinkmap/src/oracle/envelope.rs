//! Piecewise-linear envelope curves.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::error::{KinkError, Result};

/// Piecewise-linear function through anchors with strictly increasing x.
///
/// Segment `k` covers `[x_k, x_{k+1})`; the last segment is closed on both
/// ends. Outside `[x_0, x_last]` the function is undefined.
#[derive(Clone, Debug, PartialEq)]
pub struct PiecewiseLinear {
    anchors: Vec<Vector2<f64>>,
}

impl PiecewiseLinear {
    pub fn new(anchors: &[(f64, f64)]) -> Result<Self> {
        if anchors.len() < 2 {
            return Err(KinkError::MalformedEnvelope(format!(
                "need at least two anchors, got {}",
                anchors.len()
            )));
        }
        if anchors
            .iter()
            .any(|&(x, y)| !(x.is_finite() && y.is_finite()))
        {
            return Err(KinkError::MalformedEnvelope("anchors must be finite".into()));
        }
        if anchors.windows(2).any(|w| w[1].0 <= w[0].0) {
            return Err(KinkError::MalformedEnvelope(
                "anchor x must be strictly increasing".into(),
            ));
        }
        Ok(Self {
            anchors: anchors.iter().map(|&(x, y)| Vector2::new(x, y)).collect(),
        })
    }

    #[inline]
    pub fn domain(&self) -> (f64, f64) {
        (self.anchors[0].x, self.anchors[self.anchors.len() - 1].x)
    }

    pub fn anchors(&self) -> Vec<(f64, f64)> {
        self.anchors.iter().map(|p| (p.x, p.y)).collect()
    }

    /// Value at `x`, or `None` outside the domain.
    pub fn eval(&self, x: f64) -> Option<f64> {
        let (lo, hi) = self.domain();
        if !(x >= lo && x <= hi) {
            return None;
        }
        let n = self.anchors.len();
        // segment index: last anchor with x_k <= x, capped to the final segment
        let k = (self.anchors.partition_point(|p| p.x <= x) - 1).min(n - 2);
        let (a, b) = (self.anchors[k], self.anchors[k + 1]);
        let slope = (b.y - a.y) / (b.x - a.x);
        Some(a.y + slope * (x - a.x))
    }
}

/// Serializable anchor lists.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeSpec {
    pub upper: Vec<(f64, f64)>,
    pub lower: Vec<(f64, f64)>,
}

/// Upper and lower envelope curves bounding admissible traces.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub upper: PiecewiseLinear,
    pub lower: PiecewiseLinear,
}

impl Envelope {
    pub fn new(upper: &[(f64, f64)], lower: &[(f64, f64)]) -> Result<Self> {
        Ok(Self {
            upper: PiecewiseLinear::new(upper)?,
            lower: PiecewiseLinear::new(lower)?,
        })
    }

    pub fn from_spec(spec: &EnvelopeSpec) -> Result<Self> {
        Self::new(&spec.upper, &spec.lower)
    }

    pub fn to_spec(&self) -> EnvelopeSpec {
        EnvelopeSpec {
            upper: self.upper.anchors(),
            lower: self.lower.anchors(),
        }
    }

    /// The reference envelope on `[0, 20]`:
    /// upper (0,1),(8,0.9),(14,0.6),(20,0.2); lower (0,0.5),(5,0.3),(12,0.2),(20,0.1).
    pub fn canonical() -> Self {
        Self {
            upper: PiecewiseLinear {
                anchors: vec![
                    Vector2::new(0.0, 1.0),
                    Vector2::new(8.0, 0.9),
                    Vector2::new(14.0, 0.6),
                    Vector2::new(20.0, 0.2),
                ],
            },
            lower: PiecewiseLinear {
                anchors: vec![
                    Vector2::new(0.0, 0.5),
                    Vector2::new(5.0, 0.3),
                    Vector2::new(12.0, 0.2),
                    Vector2::new(20.0, 0.1),
                ],
            },
        }
    }

    /// Both curves must be defined on all of `[x_lo, x_hi]`.
    pub fn check_covers(&self, x_lo: f64, x_hi: f64) -> Result<()> {
        for (name, curve) in [("upper", &self.upper), ("lower", &self.lower)] {
            let (lo, hi) = curve.domain();
            if lo > x_lo || hi < x_hi {
                return Err(KinkError::MalformedEnvelope(format!(
                    "{name} curve spans [{lo}, {hi}] but traces need [{x_lo}, {x_hi}]"
                )));
            }
        }
        Ok(())
    }
}

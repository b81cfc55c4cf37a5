//! Labeling strategies.

use std::io::{BufRead, Write};
use std::sync::Mutex;

use super::envelope::Envelope;
use crate::error::Result;
use crate::geom::Trace;

/// A labeling capability: trace in, verdict out.
pub trait Labeler: Send + Sync {
    fn classify(&self, trace: &Trace) -> bool;

    /// Reject configurations under which `classify` would be undefined for
    /// traces over `[x_lo, x_hi]`. Called once per run.
    fn check_domain(&self, _x_lo: f64, _x_hi: f64) -> Result<()> {
        Ok(())
    }

    /// Whether `classify` may run concurrently from worker threads.
    fn parallel_safe(&self) -> bool {
        true
    }

    fn name(&self) -> &str;
}

/// Quantification used for the lower curve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LowerPolicy {
    /// ∀i ∃j≥i: `y_j ≥ lower(x_i)`.
    #[default]
    Eventually,
    /// ∀i: `y_i ≥ lower(x_i)`.
    Pointwise,
}

/// Polygon envelope oracle.
#[derive(Clone, Debug)]
pub struct PolygonOracle {
    pub envelope: Envelope,
    pub lower_policy: LowerPolicy,
}

impl PolygonOracle {
    pub fn new(envelope: Envelope) -> Self {
        Self {
            envelope,
            lower_policy: LowerPolicy::Eventually,
        }
    }

    pub fn with_lower_policy(mut self, policy: LowerPolicy) -> Self {
        self.lower_policy = policy;
        self
    }

    /// `y ≤ upper(x)` at every sample; stops at the first breach.
    pub fn upper_ok(&self, trace: &Trace) -> bool {
        trace
            .points()
            .iter()
            .all(|p| self.envelope.upper.eval(p.x).is_some_and(|u| p.y <= u))
    }

    /// Lower check under `self.lower_policy`.
    pub fn lower_ok(&self, trace: &Trace) -> bool {
        let pts = trace.points();
        match self.lower_policy {
            LowerPolicy::Pointwise => pts
                .iter()
                .all(|p| self.envelope.lower.eval(p.x).is_some_and(|l| p.y >= l)),
            LowerPolicy::Eventually => {
                // suffix maxima: best[i] = max_{j >= i} y_j
                let mut best = vec![f64::NEG_INFINITY; pts.len()];
                let mut run = f64::NEG_INFINITY;
                for (i, p) in pts.iter().enumerate().rev() {
                    run = run.max(p.y);
                    best[i] = run;
                }
                pts.iter()
                    .zip(&best)
                    .all(|(p, &m)| self.envelope.lower.eval(p.x).is_some_and(|l| m >= l))
            }
        }
    }
}

impl Labeler for PolygonOracle {
    fn classify(&self, trace: &Trace) -> bool {
        self.upper_ok(trace) && self.lower_ok(trace)
    }

    fn check_domain(&self, x_lo: f64, x_hi: f64) -> Result<()> {
        self.envelope.check_covers(x_lo, x_hi)
    }

    fn name(&self) -> &str {
        "polygon"
    }
}

/// Wraps any closure as a labeler.
pub struct FnLabeler<F> {
    name: String,
    f: F,
}

impl<F> FnLabeler<F>
where
    F: Fn(&Trace) -> bool + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Labeler for FnLabeler<F>
where
    F: Fn(&Trace) -> bool + Send + Sync,
{
    fn classify(&self, trace: &Trace) -> bool {
        (self.f)(trace)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Defers the verdict to a person: prints a trace summary and reads `y`/`n`.
///
/// Unreadable or unrecognized answers are asked again; end of input labels
/// the trace negative.
pub struct PromptLabeler<R, W> {
    io: Mutex<(R, W)>,
}

impl<R, W> PromptLabeler<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    pub fn new(input: R, output: W) -> Self {
        Self {
            io: Mutex::new((input, output)),
        }
    }

    fn ask(input: &mut R, output: &mut W, trace: &Trace) -> std::io::Result<bool> {
        let pts = trace.points();
        let (first, last) = match (pts.first(), pts.last()) {
            (Some(a), Some(b)) => (*a, *b),
            _ => return Ok(false),
        };
        let (lo, hi) = trace
            .values()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(a, b), y| (a.min(y), b.max(y)));
        writeln!(
            output,
            "trace: {} samples, ({:.3}, {:.4}) -> ({:.3}, {:.4}), y in [{lo:.4}, {hi:.4}]",
            pts.len(),
            first.x,
            first.y,
            last.x,
            last.y
        )?;
        loop {
            write!(output, "positive? [y/n] ")?;
            output.flush()?;
            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                return Ok(false);
            }
            match line.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(output, "please answer y or n")?,
            }
        }
    }
}

impl<R, W> Labeler for PromptLabeler<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn classify(&self, trace: &Trace) -> bool {
        let mut guard = match self.io.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let (input, output) = &mut *guard;
        match Self::ask(input, output, trace) {
            Ok(v) => v,
            Err(err) => {
                tracing::warn!(%err, "prompt labeler failed; labeling negative");
                false
            }
        }
    }

    fn parallel_safe(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "prompt"
    }
}

//! Seeded random grid boundaries (replayable by `(seed, index)`).
//!
//! Model
//! - Draw the `n` interior x-indices as a uniform non-decreasing sequence in
//!   `0..=num_x` (stars and bars: `n` distinct values below `num_x + n`,
//!   sorted, minus their rank), draw every y-index uniformly in `0..=num_y`,
//!   and reject draws with a collinear interior point. Each valid boundary
//!   has exactly one accepting draw, so accepted samples are uniform over
//!   boundaries with `n` kinks.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{KinkError, Result};
use crate::geom::{GridBoundary, GridDims};

/// Replay token to make draws reproducible and indexable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayToken {
    pub seed: u64,
    pub index: u64,
}

impl ReplayToken {
    #[inline]
    fn to_std_rng(self) -> StdRng {
        // SplitMix64 finalizer
        fn mix(mut x: u64) -> u64 {
            x ^= x >> 30;
            x = x.wrapping_mul(0xbf58476d1ce4e5b9);
            x ^= x >> 27;
            x = x.wrapping_mul(0x94d049bb133111eb);
            x ^ (x >> 31)
        }
        let k = mix(self.seed ^ mix(self.index.wrapping_add(0x9e3779b97f4a7c15)));
        StdRng::seed_from_u64(k)
    }
}

const MAX_ATTEMPTS: usize = 10_000;

/// Draw one grid boundary with exactly `kinks` kinks.
///
/// Fails with `InvalidParams` when the grid is too narrow for `kinks` or when
/// no draw is accepted within the attempt budget.
pub fn sample_grid_boundary(dims: &GridDims, kinks: usize, tok: ReplayToken) -> Result<GridBoundary> {
    dims.validate()?;
    if kinks > dims.max_kinks() {
        return Err(KinkError::invalid(format!(
            "{kinks} kinks exceed the {} a {}-column grid allows",
            dims.max_kinks(),
            dims.num_x + 1
        )));
    }
    let slots = dims.num_x as usize + kinks;
    let mut rng = tok.to_std_rng();
    for _ in 0..MAX_ATTEMPTS {
        let mut picks = index::sample(&mut rng, slots, kinks).into_vec();
        picks.sort_unstable();
        let xs = picks.into_iter().enumerate().map(|(rank, c)| (c - rank) as u32);
        let mut pts = Vec::with_capacity(kinks + 2);
        pts.push((0, rng.gen_range(0..=dims.num_y)));
        for x in xs {
            pts.push((x, rng.gen_range(0..=dims.num_y)));
        }
        pts.push((dims.num_x, rng.gen_range(0..=dims.num_y)));
        let gb = GridBoundary::new(pts);
        if gb.kinks() == kinks {
            return Ok(gb);
        }
    }
    Err(KinkError::invalid(format!(
        "no boundary with {kinks} kinks accepted after {MAX_ATTEMPTS} draws"
    )))
}

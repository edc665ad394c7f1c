//! Injectable randomness.
//!
//! Branch orientation, connector shape, and connector subsampling are
//! random by design. Every random choice goes through [`RandomSource`],
//! so a seeded source makes whole runs reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniformly distributed integers.
pub trait RandomSource {
    /// A uniformly distributed integer in `lo..=hi`.
    ///
    /// Implementations return `lo` when `hi < lo`.
    fn next_int(&mut self, lo: i32, hi: i32) -> i32;

    /// A fair coin flip.
    fn coin(&mut self) -> bool {
        self.next_int(0, 1) == 1
    }

    /// A uniformly distributed index below `len` (0 when `len` is 0).
    fn index(&mut self, len: usize) -> usize {
        let hi = i32::try_from(len.saturating_sub(1)).unwrap_or(i32::MAX);
        usize::try_from(self.next_int(0, hi)).unwrap_or(0)
    }
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn next_int(&mut self, lo: i32, hi: i32) -> i32 {
        (**self).next_int(lo, hi)
    }
}

/// Seedable [`RandomSource`] backed by [`StdRng`].
#[derive(Debug, Clone)]
pub struct SeededRandom(StdRng);

impl SeededRandom {
    /// Deterministic source for a given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }

    /// Source seeded from the operating system.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self(StdRng::from_os_rng())
    }
}

impl RandomSource for SeededRandom {
    fn next_int(&mut self, lo: i32, hi: i32) -> i32 {
        if hi <= lo {
            lo
        } else {
            self.0.random_range(lo..=hi)
        }
    }
}

/// Pick `k` distinct indices below `len`, returned in ascending order.
///
/// Partial Fisher-Yates over `0..len`; returns every index when
/// `k >= len`.
pub fn sample_indices<R: RandomSource + ?Sized>(rng: &mut R, len: usize, k: usize) -> Vec<usize> {
    let mut pool: Vec<usize> = (0..len).collect();
    if k >= len {
        return pool;
    }
    for i in 0..k {
        let j = i + rng.index(len - i);
        pool.swap(i, j);
    }
    pool.truncate(k);
    pool.sort_unstable();
    pool
}

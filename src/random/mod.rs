//! Random source shared by every randomized decision in discovery and ordering.
//!
//! Prefers the operating system's CSPRNG. If the OS source cannot be read,
//! at construction or on any later draw, the source degrades to a
//! time-seeded `SmallRng` instead of failing.

use rand::rand_core::impls::fill_bytes_via_next;
use rand::rngs::{OsRng, SmallRng};
use rand::{Rng, RngCore, SeedableRng, TryRngCore};
use std::time::{SystemTime, UNIX_EPOCH};

/// A fallible entropy source with its error flattened to text.
trait EntropySource: Send {
    fn try_u64(&mut self) -> Result<u64, String>;
}

impl<S: TryRngCore + Send> EntropySource for S {
    fn try_u64(&mut self) -> Result<u64, String> {
        self.try_next_u64().map_err(|e| e.to_string())
    }
}

/// Draws from `primary` until it fails once, then from `fallback` for good.
struct DegradingRng {
    primary: Option<Box<dyn EntropySource>>,
    fallback: SmallRng,
}

impl RngCore for DegradingRng {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        if let Some(primary) = self.primary.as_mut() {
            match primary.try_u64() {
                Ok(value) => return value,
                Err(e) => {
                    log::warn!("OS random source failed ({}), switching to pseudo-random fallback", e);
                    self.primary = None;
                }
            }
        }
        self.fallback.next_u64()
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        fill_bytes_via_next(self, dst)
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x9E37_79B9_7F4A_7C15)
}

/// Uniform random source.
///
/// There is no seeding or reproducibility contract: two sources built the
/// same way produce unrelated streams.
pub struct RandomSource {
    rng: DegradingRng,
}

impl RandomSource {
    /// Create a source backed by the OS generator when available.
    pub fn new() -> Self {
        match OsRng.try_next_u64() {
            Ok(_) => Self::with_primary(OsRng),
            Err(e) => {
                log::warn!("OS random source unavailable ({}), using pseudo-random fallback", e);
                Self::weak()
            }
        }
    }

    /// Non-cryptographic fallback, seeded from the wall clock.
    pub fn weak() -> Self {
        Self {
            rng: DegradingRng {
                primary: None,
                fallback: SmallRng::seed_from_u64(clock_seed()),
            },
        }
    }

    fn with_primary<S: TryRngCore + Send + 'static>(primary: S) -> Self {
        Self {
            rng: DegradingRng {
                primary: Some(Box::new(primary)),
                fallback: SmallRng::seed_from_u64(clock_seed()),
            },
        }
    }

    /// Whether draws still come from the OS CSPRNG.
    pub fn is_strong(&self) -> bool {
        self.rng.primary.is_some()
    }

    /// Uniform float in `[0, 1)` with 53 bits of precision.
    pub fn uniform(&mut self) -> f64 {
        (self.rng.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Uniform integer in `[0, n)`. Returns 0 when `n == 0`.
    pub fn uniform_int(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        self.rng.random_range(0..n)
    }

    /// Uniform integer in the inclusive range `[lo, hi]`.
    pub fn range_inclusive(&mut self, lo: u64, hi: u64) -> u64 {
        if hi <= lo {
            return lo;
        }
        self.rng.random_range(lo..=hi)
    }

    /// Pick one element uniformly, or `None` for an empty slice.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            items.get(self.uniform_int(items.len()))
        }
    }

    /// Draw `k` distinct indices from `[0, n)` (partial Fisher-Yates).
    pub fn sample_indices(&mut self, n: usize, k: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..n).collect();
        let k = k.min(n);
        for i in 0..k {
            let j = i + self.uniform_int(n - i);
            indices.swap(i, j);
        }
        indices.truncate(k);
        indices
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RandomSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomSource")
            .field("strong", &self.is_strong())
            .finish()
    }
}

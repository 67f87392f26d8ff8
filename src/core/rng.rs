//! Deterministic Random Numbers
//!
//! A sine-based hash turns a numeric seed into a float in `[0, 1)`.
//! It is a pure function of its argument, so every peer that shares a
//! maze seed reproduces the same walls and the same spawn choices.
//! It is not a uniform or secure sampler and does not need to be.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

/// Amplification applied to `sin(seed)` before taking the fractional part.
const SINE_SCALE: f64 = 1_000_000.0;

/// Map a seed to a pseudo-random float in `[0, 1)`.
///
/// # Example
///
/// ```
/// use tank_arena::core::rng::seeded_random;
///
/// let a = seeded_random(0.25);
/// assert_eq!(a, seeded_random(0.25));
/// assert!((0.0..1.0).contains(&a));
/// ```
#[inline]
pub fn seeded_random(seed: f64) -> f64 {
    let x = seed.sin() * SINE_SCALE;
    let frac = x - x.floor();
    // floor() of a huge or non-finite value can leave 1.0 or NaN behind
    if frac.is_finite() && frac < 1.0 {
        frac
    } else {
        0.0
    }
}

/// Random value for maze cell `(i, j)`: the seed perturbed by the cell coordinates.
#[inline]
pub fn cell_random(seed: f64, i: u32, j: u32) -> f64 {
    seeded_random((seed + i as f64) / (j as f64 + 1.0))
}

/// Stable numeric seed derived from a peer identifier.
///
/// Used for decorative per-peer choices (tank colour) and to spread
/// spawn points of different peers sharing one maze.
pub fn seed_from_peer_id(peer_id: &str) -> f64 {
    let mut hasher = Sha256::new();
    hasher.update(b"TANK_ARENA_PEER_V1");
    hasher.update(peer_id.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&digest[0..4]);
    u32::from_le_bytes(bytes) as f64
}

/// A fresh maze seed in `[0, 1)`, drawn only by the maze authority.
pub fn fresh_seed() -> f64 {
    rand::random::<f64>()
}

/// Reproducible sequence built on [`seeded_random`].
///
/// The `n`-th draw is `seeded_random(seed + n)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeededRng {
    seed: f64,
    counter: u64,
}

impl SeededRng {
    /// Create a sequence from a seed.
    pub fn new(seed: f64) -> Self {
        Self { seed, counter: 0 }
    }

    /// Next float in `[0, 1)`.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        let value = seeded_random(self.seed + self.counter as f64);
        self.counter += 1;
        value
    }

    /// Next index in `[0, len)`. Returns 0 for an empty range.
    pub fn next_index(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let idx = (self.next_f64() * len as f64) as usize;
        idx.min(len - 1)
    }

    /// Next heading in `[0, 2π)`.
    #[inline]
    pub fn next_angle(&mut self) -> f64 {
        self.next_f64() * std::f64::consts::TAU
    }

    /// Select an element from a slice.
    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        if slice.is_empty() {
            None
        } else {
            Some(&slice[self.next_index(slice.len())])
        }
    }
}

//! Geometry Hashing for Verification
//!
//! Peers holding a maze with equal seed and size must hold bit-identical
//! walls. A SHA-256 over the raw float bits makes that cheap to check and
//! to log.

use sha2::{Sha256, Digest};

/// Hash output type (256 bits / 32 bytes)
pub type Fingerprint = [u8; 32];

/// Deterministic hasher for simulation geometry.
///
/// Order of updates is significant.
pub struct GeometryHasher {
    hasher: Sha256,
}

impl GeometryHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for maze wall sets.
    pub fn for_maze() -> Self {
        Self::new(b"TANK_ARENA_MAZE_V1")
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with the exact bit pattern of an f64.
    #[inline]
    pub fn update_f64(&mut self, value: f64) {
        self.hasher.update(value.to_bits().to_le_bytes());
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> Fingerprint {
        self.hasher.finalize().into()
    }
}

/// Short hex prefix of a fingerprint for log lines.
pub fn short_hex(fingerprint: &Fingerprint) -> String {
    hex::encode(&fingerprint[..4])
}

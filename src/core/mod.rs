//! Core deterministic primitives.
//!
//! Everything here is a pure function of its inputs so that peers sharing
//! a seed agree without exchanging geometry.

pub mod vec2;
pub mod rng;
pub mod geometry;
pub mod hash;

// Re-export core types
pub use vec2::Vec2;
pub use rng::{SeededRng, seeded_random, cell_random, seed_from_peer_id};
pub use hash::{GeometryHasher, Fingerprint};

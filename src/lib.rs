//! # Tank Arena
//!
//! Peer-authoritative multiplayer tank arena. Every peer simulates the
//! whole match locally; only actions cross the wire, and the shared maze
//! is regenerated from a seed.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        TANK ARENA                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/             - Deterministic primitives                │
//! │  ├── vec2.rs       - 2D vector                               │
//! │  ├── rng.rs        - Seeded sine-hash randomness             │
//! │  ├── geometry.rs   - Rotations, shape tests, reflection      │
//! │  └── hash.rs       - Maze fingerprints                       │
//! │                                                              │
//! │  game/             - Simulation (no I/O)                     │
//! │  ├── input.rs      - Held controls                           │
//! │  ├── maze.rs       - Seeded wall grid                        │
//! │  ├── bullet.rs     - Reflecting projectiles                  │
//! │  ├── teleport.rs   - Wall traversal                          │
//! │  ├── tank.rs       - Tanks                                   │
//! │  ├── election.rs   - Maze authority                          │
//! │  └── round.rs      - Round rules                             │
//! │                                                              │
//! │  network/          - Peer synchronization                    │
//! │  ├── protocol.rs   - Wire messages                           │
//! │  ├── room.rs       - Transport seam, in-process mesh         │
//! │  ├── timers.rs     - Deadline queue                          │
//! │  ├── coordinator.rs- Per-peer state machine                  │
//! │  └── driver.rs     - Async tick/event loop                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Convergence
//!
//! Peers holding the same maze seed and size hold bit-identical walls.
//! Conflicting maze broadcasts resolve by timestamp (newer wins), and
//! periodic pings resend the maze to peers that fell behind.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use config::{GameConfig, ConfigError};
pub use core::vec2::Vec2;
pub use game::input::InputState;
pub use game::maze::{GameSize, Maze};
pub use game::tank::Tank;
pub use network::coordinator::Coordinator;
pub use network::driver::{PeerDriver, SystemClock};
pub use network::room::{LocalMesh, PeerId};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

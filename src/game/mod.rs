//! Game Logic Module
//!
//! Simulation shared by every peer. Nothing here touches the network or
//! the system clock; time comes in as `now` milliseconds.
//!
//! ## Module Structure
//!
//! - `input`: Held-key state and bindings
//! - `maze`: Seeded wall grid, colours, world size
//! - `bullet`: Reflecting, fading projectiles
//! - `teleport`: Wall-traversal scans
//! - `tank`: Tank movement, shooting, hit shapes
//! - `election`: Maze authority election
//! - `round`: Round phase and result rules

pub mod input;
pub mod maze;
pub mod bullet;
pub mod teleport;
pub mod tank;
pub mod election;
pub mod round;

// Re-export key types
pub use input::{InputState, ControlBindings, KeyTracker};
pub use maze::{Maze, Wall, Color, GameSize, generate_maze, collides_with_walls};
pub use bullet::{Bullet, BulletId};
pub use teleport::{TravelDirection, Traversal};
pub use tank::{Tank, TankStatus, Player, ControlOutcome};
pub use election::{AuthorityCandidate, elect_authority};
pub use round::{RoundPhase, RoundOutcome, check_round_over, outcome_message};

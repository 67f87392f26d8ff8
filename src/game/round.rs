//! Round Lifecycle
//!
//! Phase tracking plus the pure round-over rules.

use serde::{Serialize, Deserialize};

use crate::game::maze::Color;
use crate::network::room::PeerId;

/// Where the local round is.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RoundPhase {
    /// No maze held; waiting for the elected authority (if any)
    NoMaze {
        /// Authority expected to broadcast the maze
        waiting_for: Option<PeerId>,
    },
    /// Maze held, round in play
    Active,
    /// Result on display until the restart timer fires
    RoundOver {
        /// Round winner
        winner: PeerId,
        /// Banner text
        message: String,
    },
}

impl RoundPhase {
    /// Check if the round is in play.
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, RoundPhase::Active)
    }

    /// Check if the result banner is showing.
    #[inline]
    pub fn is_over(&self) -> bool {
        matches!(self, RoundPhase::RoundOver { .. })
    }

    /// Banner text, empty outside `RoundOver`.
    pub fn message(&self) -> &str {
        match self {
            RoundPhase::RoundOver { message, .. } => message,
            _ => "",
        }
    }
}

/// A roster entry as seen by the round-over check.
#[derive(Clone, Debug, PartialEq)]
pub struct RoundEntry {
    /// Peer identifier
    pub peer_id: PeerId,
    /// Still in play
    pub active: bool,
}

/// Resolved round result.
#[derive(Clone, Debug, PartialEq)]
pub struct RoundOutcome {
    /// Winning peer
    pub winner: PeerId,
    /// Banner text
    pub message: String,
    /// Local peer won against at least one remote
    pub local_won: bool,
}

/// Decide whether the round is over and who won.
///
/// Fires only with more than one tank in the roster and at most one still
/// active. The winner is the sole survivor, or the local tank when nobody
/// survives. A solo session never ends by elimination.
pub fn check_round_over(entries: &[RoundEntry], local: &PeerId) -> Option<PeerId> {
    if entries.len() <= 1 {
        return None;
    }
    let mut active = entries.iter().filter(|e| e.active);
    let first = active.next();
    if active.next().is_some() {
        return None;
    }
    Some(first.map_or_else(|| local.clone(), |e| e.peer_id.clone()))
}

/// Banner for a finished round.
pub fn outcome_message(
    winner: &PeerId,
    winner_color: Color,
    local: &PeerId,
    remote_count: usize,
) -> RoundOutcome {
    if winner == local && remote_count > 0 {
        return RoundOutcome {
            winner: winner.clone(),
            message: "You Win!".to_string(),
            local_won: true,
        };
    }

    let message = match remote_count {
        0 => "Game Over!".to_string(),
        1 => "You Lose!".to_string(),
        _ => format!("You Lose!(the {} tank wins)", winner_color.as_str()),
    };
    RoundOutcome {
        winner: winner.clone(),
        message,
        local_won: false,
    }
}

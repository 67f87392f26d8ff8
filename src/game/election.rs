//! Authority Election
//!
//! The peer with the smallest screen extent generates each round's maze,
//! so the maze fits every viewport. Pure over a roster snapshot.

use std::collections::BTreeSet;

use crate::game::maze::GameSize;
use crate::network::room::PeerId;

/// One roster entry as seen by the election.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthorityCandidate {
    /// Peer identifier
    pub peer_id: PeerId,
    /// Normalized screen size declared at join
    pub screen: GameSize,
    /// Original creation time (ms)
    pub created_at: u64,
}

/// Elect the maze authority.
///
/// Smallest `width + height` wins; equal extents go to the earliest
/// creation time, then to the lowest peer id. Excluded peers (failed
/// authorities) are skipped. `None` only when every candidate is excluded.
pub fn elect_authority(
    candidates: &[AuthorityCandidate],
    excluded: &BTreeSet<PeerId>,
) -> Option<PeerId> {
    let mut eligible: Vec<&AuthorityCandidate> = candidates
        .iter()
        .filter(|c| !excluded.contains(&c.peer_id))
        .collect();
    eligible.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.peer_id.cmp(&b.peer_id))
    });

    let mut best: Option<&AuthorityCandidate> = None;
    for candidate in eligible {
        // Strict comparison keeps the earliest among equals
        let better = best.map_or(true, |b| candidate.screen.extent() < b.screen.extent());
        if better {
            best = Some(candidate);
        }
    }

    best.map(|c| c.peer_id.clone())
}

//! Deadline Timers
//!
//! Deferred coordinator work, polled once per tick against the injected
//! clock. Nothing here spawns tasks; a timer only fires when the
//! coordinator asks for due entries.

use std::collections::BTreeMap;

use crate::network::room::PeerId;

/// Deferred coordinator work.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Timer {
    /// Result banner elapsed; start the next round.
    RoundRestart,
    /// Authority had its chance to deliver a maze.
    MazeWait {
        /// Peer we were waiting for
        authority: PeerId,
        /// Round counter when the wait was armed
        round: u64,
    },
}

/// Deadline-ordered timer set. Equal deadlines fire in scheduling order.
#[derive(Debug, Default)]
pub struct TimerQueue {
    entries: BTreeMap<(u64, u64), Timer>,
    next_seq: u64,
}

impl TimerQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire `timer` once `now >= at`.
    pub fn schedule(&mut self, at: u64, timer: Timer) {
        self.entries.insert((at, self.next_seq), timer);
        self.next_seq += 1;
    }

    /// Drop every pending entry equal to `timer`. Returns how many.
    pub fn cancel(&mut self, timer: &Timer) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, t| t != timer);
        before - self.entries.len()
    }

    /// Check if an entry equal to `timer` is pending.
    pub fn is_pending(&self, timer: &Timer) -> bool {
        self.entries.values().any(|t| t == timer)
    }

    /// Remove and return every entry due at `now`, earliest first.
    pub fn due(&mut self, now: u64) -> Vec<Timer> {
        let mut fired = Vec::new();
        while let Some(entry) = self.entries.first_entry() {
            if entry.key().0 > now {
                break;
            }
            fired.push(entry.remove());
        }
        fired
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

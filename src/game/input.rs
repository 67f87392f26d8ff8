//! Input State
//!
//! Named directional/action fields, decoupled from whatever device names
//! the host uses for keys. Hosts translate raw key events through
//! [`ControlBindings`].

use std::collections::BTreeSet;
use serde::{Serialize, Deserialize};

/// Held controls for one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputState {
    /// Drive along the facing direction
    pub forward: bool,
    /// Drive against the facing direction
    pub backward: bool,
    /// Rotate counter-clockwise (screen space)
    pub turn_left: bool,
    /// Rotate clockwise (screen space)
    pub turn_right: bool,
    /// Fire
    pub shoot: bool,
}

impl InputState {
    /// No controls held.
    pub const fn idle() -> Self {
        Self {
            forward: false,
            backward: false,
            turn_left: false,
            turn_right: false,
            shoot: false,
        }
    }

    /// Check if nothing is held.
    #[inline]
    pub fn is_idle(&self) -> bool {
        *self == Self::idle()
    }

    /// Signed turn direction: -1 left, +1 right, 0 none or both.
    #[inline]
    pub fn turn_direction(&self) -> f64 {
        match (self.turn_left, self.turn_right) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        }
    }
}

/// Mapping from raw key identifiers to control fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlBindings {
    /// Key driving forward
    pub up: String,
    /// Key driving backward
    pub down: String,
    /// Key turning left
    pub left: String,
    /// Key turning right
    pub right: String,
    /// Key firing
    pub shoot: String,
}

impl Default for ControlBindings {
    fn default() -> Self {
        Self {
            up: "ArrowUp".to_string(),
            down: "ArrowDown".to_string(),
            left: "ArrowLeft".to_string(),
            right: "ArrowRight".to_string(),
            shoot: " ".to_string(),
        }
    }
}

impl ControlBindings {
    /// Build the input state from the set of currently held keys.
    pub fn resolve(&self, held: &BTreeSet<String>) -> InputState {
        InputState {
            forward: held.contains(&self.up),
            backward: held.contains(&self.down),
            turn_left: held.contains(&self.left),
            turn_right: held.contains(&self.right),
            shoot: held.contains(&self.shoot),
        }
    }
}

/// Held-key tracker fed by raw key events.
///
/// Cleared wholesale on focus loss so no key stays stuck down.
#[derive(Clone, Debug, Default)]
pub struct KeyTracker {
    held: BTreeSet<String>,
}

impl KeyTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key press.
    pub fn press(&mut self, key: impl Into<String>) {
        self.held.insert(key.into());
    }

    /// Record a key release.
    pub fn release(&mut self, key: &str) {
        self.held.remove(key);
    }

    /// Forget all held keys (window blur, context menu).
    pub fn clear(&mut self) {
        self.held.clear();
    }

    /// Resolve against a binding set.
    pub fn state(&self, bindings: &ControlBindings) -> InputState {
        bindings.resolve(&self.held)
    }
}

use crate::domain::models::{Direction, KeyState};

/// Owns the mutable held/released map for the four directions.
///
/// Only the bridge mutates it; everything else sees [`KeyState`] copies.
#[derive(Debug, Default)]
pub struct KeyStateTracker {
    state: KeyState,
}

impl KeyStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transition. Returns `true` only if the stored value flipped,
    /// so hardware auto-repeat and stray releases are no-ops.
    pub fn set(&mut self, direction: Direction, held: bool) -> bool {
        if self.state.get(direction) == held {
            return false;
        }
        self.state.set(direction, held);
        true
    }

    pub fn snapshot(&self) -> KeyState {
        self.state
    }

    /// Release every direction. Returns `true` if anything was held.
    pub fn release_all(&mut self) -> bool {
        let was_idle = self.state.is_idle();
        self.state = KeyState::default();
        !was_idle
    }
}

//! Local countdown state

use serde::{Deserialize, Serialize};

/// Lifecycle of the local countdown engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountdownState {
    /// No duration configured
    #[default]
    Unset,
    /// Duration configured, not started yet
    Set,
    Running,
    /// Suspended with the remaining time preserved
    Paused,
}

impl CountdownState {
    /// Running or paused, i.e. the engine owns the remaining time
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }
}

/// Point-in-time view of the countdown engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CountdownSnapshot {
    pub state: CountdownState,
    pub remaining: u64,
}

impl CountdownSnapshot {
    pub fn new(state: CountdownState, remaining: u64) -> Self {
        Self { state, remaining }
    }

    /// Check if the countdown is ticking
    pub fn is_running(&self) -> bool {
        self.state == CountdownState::Running
    }

    /// Remaining seconds if the engine currently owns them
    pub fn active_remaining(&self) -> Option<u64> {
        if self.state.is_active() {
            Some(self.remaining)
        } else {
            None
        }
    }
}

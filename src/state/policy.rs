//! Thresholds deciding when local time is trusted over the appliance

use serde::{Deserialize, Serialize};

pub const DEFAULT_TRANSITION_TOLERANCE_SECS: u64 = 2;
pub const DEFAULT_DRIFT_TOLERANCE_SECS: u64 = 10;
pub const DEFAULT_IDLE_CONFIRMATION_SECS: u64 = 5;

/// Tolerances used by the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPolicy {
    /// On a running/pause transition, local time within this distance of the
    /// reported time is kept to avoid visible jumps
    pub transition_tolerance: u64,
    /// While running, local time further than this from the reported time is corrected
    pub drift_tolerance: u64,
    /// An idle report only resets a running countdown whose local time exceeds the
    /// reported time by more than this
    pub idle_confirmation: u64,
}

impl SyncPolicy {
    pub fn new(transition_tolerance: u64, drift_tolerance: u64, idle_confirmation: u64) -> Self {
        Self {
            transition_tolerance,
            drift_tolerance,
            idle_confirmation,
        }
    }
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_TRANSITION_TOLERANCE_SECS,
            DEFAULT_DRIFT_TOLERANCE_SECS,
            DEFAULT_IDLE_CONFIRMATION_SECS,
        )
    }
}

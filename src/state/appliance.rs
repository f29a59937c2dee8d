//! Remote appliance state and inbound status snapshots

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operating mode reported by the appliance. The device is the source of truth for this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplianceState {
    #[default]
    Idle,
    Running,
    Pause,
}

impl ApplianceState {
    /// Decode a wire code, falling back to `default` for anything unknown
    pub fn from_code(code: i64, default: ApplianceState) -> Self {
        match code {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Pause,
            _ => default,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Idle => 0,
            Self::Running => 1,
            Self::Pause => 2,
        }
    }

    /// Running or paused, i.e. the appliance holds a countdown
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Pause)
    }
}

/// One `statusUpdate` payload: `{state, timeInSeconds}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub state: ApplianceState,
    pub remaining: u64,
}

impl StatusMessage {
    pub fn new(state: ApplianceState, remaining: u64) -> Self {
        Self { state, remaining }
    }

    /// Build a status from a raw payload. Missing or invalid fields are defaulted
    /// (unknown state -> idle, bad time -> 0) so a sloppy device never stalls the pipeline.
    pub fn from_value(value: &Value) -> Self {
        let state = value
            .get("state")
            .and_then(Value::as_i64)
            .map(|code| ApplianceState::from_code(code, ApplianceState::Idle))
            .unwrap_or_default();

        let remaining = value
            .get("timeInSeconds")
            .and_then(Value::as_i64)
            .map(|secs| secs.max(0) as u64)
            .unwrap_or(0);

        Self { state, remaining }
    }
}

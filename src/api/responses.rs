//! API response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    panel::{IntentOutcome, PanelView},
    state::CountdownSnapshot,
};

/// Body of `POST /time`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AddTimeRequest {
    pub delta: i64,
}

/// Response to an intent endpoint
#[derive(Debug, Clone, Serialize)]
pub struct IntentResponse {
    pub outcome: IntentOutcome,
    pub timestamp: DateTime<Utc>,
    pub panel: PanelView,
}

impl IntentResponse {
    pub fn new(outcome: IntentOutcome, panel: PanelView) -> Self {
        Self {
            outcome,
            timestamp: Utc::now(),
            panel,
        }
    }
}

/// Panel and session status
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub panel: PanelView,
    pub session: CountdownSnapshot,
    pub hosting: bool,
    pub uptime: String,
    pub port: u16,
    pub host: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

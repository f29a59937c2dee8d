//! Shared state handed to the HTTP layer

use std::time::Instant;

use crate::{panel::ControlPanel, session::SessionController};

/// Long-lived handles the control surface works with
#[derive(Debug, Clone)]
pub struct AppState {
    pub panel: ControlPanel,
    pub session: SessionController,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
}

impl AppState {
    pub fn new(panel: ControlPanel, session: SessionController, port: u16, host: String) -> Self {
        Self {
            panel,
            session,
            start_time: Instant::now(),
            port,
            host,
        }
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let secs = self.start_time.elapsed().as_secs();
        let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);

        match (hours, minutes) {
            (0, 0) => format!("{}s", seconds),
            (0, _) => format!("{}m {}s", minutes, seconds),
            _ => format!("{}h {}m {}s", hours, minutes, seconds),
        }
    }
}

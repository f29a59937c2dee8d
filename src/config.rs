//! Configuration and CLI argument handling

use std::time::Duration;
use clap::Parser;

use crate::state::{
    policy::{DEFAULT_DRIFT_TOLERANCE_SECS, DEFAULT_IDLE_CONFIRMATION_SECS, DEFAULT_TRANSITION_TOLERANCE_SECS},
    SyncPolicy,
};

/// CLI argument parsing structure
#[derive(Parser, Debug, Clone)]
#[command(name = "microwave-remote")]
#[command(about = "Remote control for a networked microwave with a locally running countdown")]
#[command(version)]
pub struct Config {
    /// Appliance address (host:port)
    #[arg(short, long, default_value = "192.168.178.146:80")]
    pub device: String,

    /// Port for the local control API
    #[arg(short, long, default_value = "8400")]
    pub port: u16,

    /// Host address for the local control API
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Longest countdown that can be dialed in, in minutes
    #[arg(long, default_value = "99")]
    pub max_minutes: u64,

    /// Local time this close to the appliance's is kept on start/pause (seconds)
    #[arg(long, default_value_t = DEFAULT_TRANSITION_TOLERANCE_SECS)]
    pub transition_tolerance: u64,

    /// Drift beyond which a running countdown is corrected (seconds)
    #[arg(long, default_value_t = DEFAULT_DRIFT_TOLERANCE_SECS)]
    pub drift_tolerance: u64,

    /// Margin below which an idle report does not stop a running countdown (seconds)
    #[arg(long, default_value_t = DEFAULT_IDLE_CONFIRMATION_SECS)]
    pub idle_confirmation: u64,

    /// Delay between reconnect attempts (seconds)
    #[arg(long, default_value = "3")]
    pub reconnect_delay: u64,

    /// Poll the appliance for status every N seconds, 0 disables polling
    #[arg(long, default_value = "0")]
    pub status_poll: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the control API address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn sync_policy(&self) -> SyncPolicy {
        SyncPolicy::new(self.transition_tolerance, self.drift_tolerance, self.idle_confirmation)
    }

    pub fn max_seconds(&self) -> u64 {
        self.max_minutes.saturating_mul(60)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay.max(1))
    }

    pub fn status_poll(&self) -> Option<Duration> {
        (self.status_poll > 0).then(|| Duration::from_secs(self.status_poll))
    }
}

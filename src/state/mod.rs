//! State management module
//!
//! Appliance and countdown data model, sync thresholds, and the state shared with
//! the HTTP layer.

pub mod appliance;
pub mod app_state;
pub mod countdown;
pub mod policy;

// Re-export main types
pub use appliance::{ApplianceState, StatusMessage};
pub use app_state::AppState;
pub use countdown::{CountdownSnapshot, CountdownState};
pub use policy::SyncPolicy;

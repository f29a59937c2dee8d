//! Background tasks module
//! 
//! Long-running loops that keep the local countdown aligned with the appliance.

pub mod session_sync;
pub mod status_refresh;

// Re-export main functions
pub use session_sync::session_sync_task;
pub use status_refresh::status_refresh_task;

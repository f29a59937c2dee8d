//! Utility functions module
//! 
//! Formatting and process-level helpers shared by the binary and the library.

pub mod format;
pub mod signals;

// Re-export main functions
pub use format::format_remaining;
pub use signals::shutdown_signal;

//! Microwave Remote - keeps a local countdown in sync with a networked microwave
//!
//! The appliance is the source of truth; a local countdown keeps ticking between its
//! status updates and is reconciled against them as they arrive.

pub mod config;
pub mod state;
pub mod timer;
pub mod channel;
pub mod sync;
pub mod session;
pub mod panel;
pub mod api;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use state::{AppState, ApplianceState, CountdownState, StatusMessage, SyncPolicy};
pub use timer::CountdownEngine;
pub use channel::{ChannelEvent, Command, RemoteChannel};
pub use session::SessionController;
pub use panel::{ControlPanel, UserIntent};
pub use api::create_router;
pub use utils::signals::shutdown_signal;

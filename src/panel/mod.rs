//! Control panel module
//!
//! The user-facing side of the remote: intents in, a render-ready view and
//! notifications out.

pub mod control_panel;

pub use control_panel::{
    ConnectionStatus, ControlPanel, IntentOutcome, PanelError, PanelEvent, PanelSettings,
    PanelView, UserIntent, DEFAULT_MAX_SECONDS,
};

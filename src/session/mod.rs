//! Foreground countdown session
//!
//! The session owns the countdown independently of any control surface; see
//! `tasks::session_sync` for how it follows the appliance on its own.

pub mod controller;

pub use controller::{SessionController, SessionEvent};

//! Local countdown module
//!
//! The engine is the only writer of the countdown state; everything else reads
//! snapshots or listens to its events.

pub mod engine;

pub use engine::{CountdownEngine, CountdownEvent, TICK_PERIOD};

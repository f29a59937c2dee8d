//! Remote state channel
//!
//! Transport-agnostic contract between the core and the appliance: outbound commands,
//! inbound connection and status events. Listeners subscribe to a bounded broadcast
//! bus; dropping the receiver unsubscribes.

pub mod frame;
pub mod memory;
pub mod socket;

use thiserror::Error;
use tokio::sync::broadcast;

use crate::state::StatusMessage;

pub use memory::MemoryChannel;
pub use socket::SocketChannel;

/// Capacity of the channel event bus
pub const EVENT_CAPACITY: usize = 64;

/// Commands sent to the appliance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start { seconds: u64 },
    Pause,
    Stop,
    AddTime { delta: i64 },
    RequestStatus,
}

impl Command {
    /// Event name used on the wire
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Pause => "pause",
            Self::Stop => "stop",
            Self::AddTime { .. } => "addTime",
            Self::RequestStatus => "getStatus",
        }
    }
}

/// Events delivered by the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    Connected,
    Disconnected,
    Status(StatusMessage),
}

/// Transport failures. These never leave the transport: the core only sees `Disconnected`.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed frame: {0}")]
    Frame(#[from] serde_json::Error),

    #[error("connection closed by appliance")]
    Closed,
}

/// A persistent bidirectional connection to the appliance.
///
/// Sending is fire-and-forget; a command that cannot be delivered is dropped by the
/// transport, since the next status update re-syncs everything anyway.
pub trait RemoteChannel: Send + Sync {
    fn send(&self, command: Command);

    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent>;

    fn is_connected(&self) -> bool;

    fn start(&self, seconds: u64) {
        self.send(Command::Start { seconds });
    }

    fn pause(&self) {
        self.send(Command::Pause);
    }

    fn stop(&self) {
        self.send(Command::Stop);
    }

    fn add_time(&self, delta: i64) {
        self.send(Command::AddTime { delta });
    }

    fn request_status(&self) {
        self.send(Command::RequestStatus);
    }
}

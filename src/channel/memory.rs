//! In-process channel used to stand in for the appliance

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, PoisonError,
};
use tokio::sync::broadcast;
use tracing::debug;

use super::{ChannelEvent, Command, RemoteChannel, EVENT_CAPACITY};

/// Records outbound commands and lets the caller inject inbound events
#[derive(Debug)]
pub struct MemoryChannel {
    sent: Mutex<Vec<Command>>,
    connected: AtomicBool,
    events_tx: broadcast::Sender<ChannelEvent>,
}

impl MemoryChannel {
    /// Create a disconnected channel
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            sent: Mutex::new(Vec::new()),
            connected: AtomicBool::new(false),
            events_tx,
        }
    }

    /// Deliver an event to subscribers as if it came from the appliance
    pub fn inject(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => self.connected.store(true, Ordering::SeqCst),
            ChannelEvent::Disconnected => self.connected.store(false, Ordering::SeqCst),
            ChannelEvent::Status(_) => {}
        }
        let _ = self.events_tx.send(event);
    }

    /// Commands sent so far
    pub fn sent(&self) -> Vec<Command> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Commands sent so far, clearing the log
    pub fn take_sent(&self) -> Vec<Command> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteChannel for MemoryChannel {
    fn send(&self, command: Command) {
        debug!("memory channel <- {:?}", command);
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command);
    }

    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events_tx.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

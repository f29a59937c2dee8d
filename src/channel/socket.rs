//! TCP transport speaking newline-delimited JSON frames

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    sync::{broadcast, mpsc},
    task::JoinHandle,
    time::sleep,
};
use tracing::{debug, info, warn};

use super::{frame, ChannelError, ChannelEvent, Command, RemoteChannel, EVENT_CAPACITY};

/// Connection to the appliance that keeps reconnecting after a fixed delay
#[derive(Debug)]
pub struct SocketChannel {
    outbound_tx: mpsc::UnboundedSender<Command>,
    events_tx: broadcast::Sender<ChannelEvent>,
    connected: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl SocketChannel {
    /// Spawn the connection task for `address` (`host:port`)
    pub fn connect(address: String, reconnect_delay: Duration) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(connection_task(
            address,
            reconnect_delay,
            outbound_rx,
            events_tx.clone(),
            Arc::clone(&connected),
        ));

        Self {
            outbound_tx,
            events_tx,
            connected,
            task,
        }
    }

    /// Stop the connection task
    pub fn close(&self) {
        self.task.abort();
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self.events_tx.send(ChannelEvent::Disconnected);
        }
    }
}

impl Drop for SocketChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl RemoteChannel for SocketChannel {
    fn send(&self, command: Command) {
        if !self.is_connected() {
            debug!("Dropping {:?} while disconnected", command);
            return;
        }
        if self.outbound_tx.send(command).is_err() {
            warn!("Connection task gone, dropping {:?}", command);
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events_tx.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

async fn connection_task(
    address: String,
    reconnect_delay: Duration,
    mut outbound_rx: mpsc::UnboundedReceiver<Command>,
    events_tx: broadcast::Sender<ChannelEvent>,
    connected: Arc<AtomicBool>,
) {
    info!("Starting appliance connection task for {}", address);

    loop {
        match TcpStream::connect(&address).await {
            Ok(stream) => {
                info!("Connected to appliance at {}", address);
                connected.store(true, Ordering::SeqCst);
                let _ = events_tx.send(ChannelEvent::Connected);

                if let Err(e) = serve(stream, &mut outbound_rx, &events_tx).await {
                    warn!("Appliance connection lost: {}", e);
                }

                connected.store(false, Ordering::SeqCst);
                let _ = events_tx.send(ChannelEvent::Disconnected);
            }
            Err(e) => {
                warn!("Failed to connect to appliance at {}: {}", address, e);
            }
        }

        sleep(reconnect_delay).await;

        // Commands queued against the dead connection are stale by now
        while let Ok(command) = outbound_rx.try_recv() {
            debug!("Discarding {:?} queued before reconnect", command);
        }
    }
}

/// Pump one live connection until it fails or closes
async fn serve(
    stream: TcpStream,
    outbound_rx: &mut mpsc::UnboundedReceiver<Command>,
    events_tx: &broadcast::Sender<ChannelEvent>,
) -> Result<(), ChannelError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Err(ChannelError::Closed);
                };
                if line.trim().is_empty() {
                    continue;
                }
                match frame::decode(&line) {
                    Ok(Some(event)) => {
                        let _ = events_tx.send(event);
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Skipping inbound line: {}", e),
                }
            }

            Some(command) = outbound_rx.recv() => {
                debug!("appliance <- {:?}", command);
                let line = frame::encode(command)?;
                writer.write_all(line.as_bytes()).await?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ApplianceState, StatusMessage};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn exchanges_frames_with_appliance() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let channel = SocketChannel::connect(address, Duration::from_millis(50));
        let mut events = channel.subscribe();

        let (stream, _) = listener.accept().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), ChannelEvent::Connected);
        assert!(channel.is_connected());

        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        channel.start(42);
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            r#"{"event":"start","data":42}"#
        );

        writer
            .write_all(b"garbage\n{\"event\":\"statusUpdate\",\"data\":{\"state\":1,\"timeInSeconds\":41}}\n")
            .await
            .unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            ChannelEvent::Status(StatusMessage::new(ApplianceState::Running, 41))
        );

        drop(writer);
        drop(lines);
        assert_eq!(events.recv().await.unwrap(), ChannelEvent::Disconnected);
        assert!(!channel.is_connected());
    }
}

//! Session status sync background task

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::{channel::ChannelEvent, session::SessionController};

/// Keeps the session's countdown in line with the appliance, with or without a panel attached.
///
/// This is the only consumer that folds statuses into the session; an attached panel
/// follows the published outcomes. Ends when the channel event bus closes.
pub async fn session_sync_task(
    session: SessionController,
    mut events: broadcast::Receiver<ChannelEvent>,
) {
    info!("Starting session sync task");

    loop {
        match events.recv().await {
            Ok(ChannelEvent::Status(status)) => {
                let outcome = session.reconcile(status);

                if outcome.state_changed() {
                    debug!(
                        "Session sees appliance {:?} -> {:?}",
                        outcome.previous, outcome.current
                    );
                }
            }
            Ok(ChannelEvent::Connected) | Ok(ChannelEvent::Disconnected) => {}
            Err(RecvError::Lagged(missed)) => {
                // The next status carries the full state, nothing to replay
                warn!("Session sync missed {} channel events", missed);
            }
            Err(RecvError::Closed) => {
                info!("Channel closed, session sync task stopping");
                break;
            }
        }
    }
}

//! Status refresh background task

use std::{sync::Arc, time::Duration};
use tokio::{
    sync::broadcast::error::RecvError,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::channel::{ChannelEvent, RemoteChannel};

/// Requests a full status on every (re)connect and, if `poll` is set, periodically while connected
pub async fn status_refresh_task(channel: Arc<dyn RemoteChannel>, poll: Option<Duration>) {
    info!("Starting status refresh task");

    let mut events = channel.subscribe();
    if channel.is_connected() {
        channel.request_status();
    }

    // An hour-long interval stands in for "never" when polling is off
    let mut poll_timer = interval(poll.unwrap_or(Duration::from_secs(3600)));
    poll_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    poll_timer.tick().await;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ChannelEvent::Connected) => {
                    info!("Connection (re)established, requesting appliance status");
                    channel.request_status();
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    warn!("Status refresh missed {} channel events", missed);
                    if channel.is_connected() {
                        channel.request_status();
                    }
                }
                Err(RecvError::Closed) => {
                    info!("Channel closed, status refresh task stopping");
                    break;
                }
            },

            _ = poll_timer.tick(), if poll.is_some() => {
                if channel.is_connected() {
                    debug!("Polling appliance status");
                    channel.request_status();
                }
            }
        }
    }
}

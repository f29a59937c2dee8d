//! Control panel state management
//!
//! The panel is what a user interface talks to. One task owns all panel state and
//! handles user intents, connection changes, reconciliation outcomes and session events
//! one at a time, so a status update can never interleave with half of an intent.
//!
//! The panel never reconciles on its own. Statuses are folded into the countdown by the
//! session; the panel follows the outcomes the session publishes.

use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{
    broadcast::{
        self,
        error::{RecvError, TryRecvError},
    },
    mpsc, oneshot, watch,
};
use tracing::{debug, info, warn};

use crate::{
    channel::{ChannelEvent, RemoteChannel},
    session::{SessionController, SessionEvent},
    state::ApplianceState,
    sync::Reconciliation,
    utils::format_remaining,
};

/// Longest countdown that can be dialed in
pub const DEFAULT_MAX_SECONDS: u64 = 99 * 60;

const REQUEST_CAPACITY: usize = 32;
const EVENT_CAPACITY: usize = 128;

/// Something the user asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum UserIntent {
    Start,
    Pause,
    Stop,
    /// Positive or negative change of the dialed time
    AddTime { delta: i64 },
}

/// Whether an intent was acted upon. Rejections are expected races, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentOutcome {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

/// Everything a user interface needs to render the panel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelView {
    pub connection: ConnectionStatus,
    pub appliance: ApplianceState,
    pub remaining: u64,
    pub remaining_text: String,
    pub controls_enabled: bool,
    pub last_status_at: Option<DateTime<Utc>>,
}

/// Notifications for attached interfaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PanelEvent {
    Connection { status: ConnectionStatus },
    StateChanged { appliance: ApplianceState, remaining: u64 },
    Display { remaining: u64 },
    ControlsEnabled { enabled: bool },
}

#[derive(Debug, Clone, Copy)]
pub struct PanelSettings {
    pub max_seconds: u64,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            max_seconds: DEFAULT_MAX_SECONDS,
        }
    }
}

#[derive(Error, Debug)]
pub enum PanelError {
    #[error("control panel task has stopped")]
    Closed,
}

#[derive(Debug)]
enum Request {
    Intent(UserIntent, oneshot::Sender<IntentOutcome>),
    Refresh(oneshot::Sender<PanelView>),
}

/// Handle to the panel task. Clones talk to the same panel.
#[derive(Debug, Clone)]
pub struct ControlPanel {
    requests_tx: mpsc::Sender<Request>,
    view_rx: watch::Receiver<PanelView>,
    events_tx: broadcast::Sender<PanelEvent>,
}

impl ControlPanel {
    /// Spawn the panel task on the current runtime
    pub fn spawn(
        channel: Arc<dyn RemoteChannel>,
        session: SessionController,
        settings: PanelSettings,
    ) -> Self {
        let (requests_tx, requests_rx) = mpsc::channel(REQUEST_CAPACITY);
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        // Subscribe before anything can happen so no event is missed
        let inputs = Inputs {
            channel_rx: channel.subscribe(),
            reconciled_rx: session.subscribe_reconciled(),
            session_rx: session.subscribe(),
        };

        let connected = channel.is_connected();
        let mut worker = PanelWorker {
            appliance: session.appliance(),
            max_seconds: settings.max_seconds,
            connection: if connected {
                ConnectionStatus::Connected
            } else {
                ConnectionStatus::Connecting
            },
            display: session.time_remaining(),
            controls_enabled: true,
            await_state_change: false,
            last_status_at: None,
            channel,
            session,
            events_tx: events_tx.clone(),
            view_tx: None,
        };

        let (view_tx, view_rx) = watch::channel(worker.view());
        worker.view_tx = Some(view_tx);

        if connected {
            worker.channel.request_status();
        } else {
            info!("Waiting for appliance connection");
        }

        tokio::spawn(worker.run(requests_rx, inputs));

        Self {
            requests_tx,
            view_rx,
            events_tx,
        }
    }

    /// Hand an intent to the panel and wait for the verdict
    pub async fn submit(&self, intent: UserIntent) -> Result<IntentOutcome, PanelError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests_tx
            .send(Request::Intent(intent, reply_tx))
            .await
            .map_err(|_| PanelError::Closed)?;
        reply_rx.await.map_err(|_| PanelError::Closed)
    }

    /// The view once every input queued so far has been handled
    pub async fn refresh(&self) -> Result<PanelView, PanelError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests_tx
            .send(Request::Refresh(reply_tx))
            .await
            .map_err(|_| PanelError::Closed)?;
        reply_rx.await.map_err(|_| PanelError::Closed)
    }

    /// Latest published view, without waiting for queued inputs
    pub fn view(&self) -> PanelView {
        self.view_rx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<PanelView> {
        self.view_rx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PanelEvent> {
        self.events_tx.subscribe()
    }
}

struct Inputs {
    channel_rx: broadcast::Receiver<ChannelEvent>,
    reconciled_rx: broadcast::Receiver<Reconciliation>,
    session_rx: broadcast::Receiver<SessionEvent>,
}

struct PanelWorker {
    /// Last state the session reconciled against
    appliance: ApplianceState,
    max_seconds: u64,
    connection: ConnectionStatus,
    /// Time shown to the user; the edit buffer before a countdown exists
    display: u64,
    controls_enabled: bool,
    /// Controls stay disabled after an intent until the appliance changes state
    await_state_change: bool,
    last_status_at: Option<DateTime<Utc>>,
    channel: Arc<dyn RemoteChannel>,
    session: SessionController,
    events_tx: broadcast::Sender<PanelEvent>,
    view_tx: Option<watch::Sender<PanelView>>,
}

impl PanelWorker {
    async fn run(mut self, mut requests_rx: mpsc::Receiver<Request>, mut inputs: Inputs) {
        debug!("Control panel task started");

        loop {
            tokio::select! {
                event = inputs.channel_rx.recv() => match event {
                    Ok(event) => self.on_channel_event(event),
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Panel missed {} channel events, requesting status", missed);
                        self.channel.request_status();
                    }
                    Err(RecvError::Closed) => break,
                },

                outcome = inputs.reconciled_rx.recv() => match outcome {
                    Ok(outcome) => self.on_reconciled(outcome),
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Panel missed {} status outcomes, requesting status", missed);
                        self.channel.request_status();
                    }
                    Err(RecvError::Closed) => break,
                },

                event = inputs.session_rx.recv() => match event {
                    Ok(event) => self.on_session_event(event),
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Panel missed {} session events", missed);
                        let remaining = self.session.time_remaining();
                        self.set_display(remaining);
                        self.publish();
                    }
                    Err(RecvError::Closed) => break,
                },

                request = requests_rx.recv() => {
                    let Some(request) = request else { break };
                    self.catch_up(&mut inputs);
                    match request {
                        Request::Intent(intent, reply) => {
                            let outcome = self.on_intent(intent);
                            self.publish();
                            let _ = reply.send(outcome);
                        }
                        Request::Refresh(reply) => {
                            let _ = reply.send(self.view());
                        }
                    }
                }
            }
        }

        debug!("Control panel task stopped");
    }

    /// Handle what the buses already hold, so a request sees every input queued before it.
    /// Session events go last: they carry the engine's most recent time.
    fn catch_up(&mut self, inputs: &mut Inputs) {
        while let Some(event) = next_pending(&mut inputs.channel_rx) {
            self.on_channel_event(event);
        }
        while let Some(outcome) = next_pending(&mut inputs.reconciled_rx) {
            self.on_reconciled(outcome);
        }
        while let Some(event) = next_pending(&mut inputs.session_rx) {
            self.on_session_event(event);
        }
    }

    fn on_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => {
                info!("Appliance connected");
                self.set_connection(ConnectionStatus::Connected);
                // A lost reply would otherwise leave the controls disabled
                self.release_controls();
            }
            ChannelEvent::Disconnected => {
                warn!("Appliance disconnected");
                self.set_connection(ConnectionStatus::Disconnected);
            }
            // Folded in by the session, seen here as a reconciliation outcome
            ChannelEvent::Status(_) => return,
        }
        self.publish();
    }

    fn on_reconciled(&mut self, outcome: Reconciliation) {
        self.last_status_at = Some(Utc::now());
        self.appliance = outcome.current;

        if outcome.state_changed() {
            info!(
                "Appliance {:?} -> {:?} with {}",
                outcome.previous,
                outcome.current,
                format_remaining(outcome.display)
            );
            self.display = outcome.display;
            self.release_controls();
            self.emit(PanelEvent::StateChanged {
                appliance: outcome.current,
                remaining: outcome.display,
            });
        } else if outcome.directive.is_some() {
            self.set_display(outcome.display);
        }
        self.publish();
    }

    fn on_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Reset => {}
            other => {
                if let Some(remaining) = other.remaining() {
                    self.set_display(remaining);
                }
            }
        }
        self.publish();
    }

    fn on_intent(&mut self, intent: UserIntent) -> IntentOutcome {
        let appliance = self.appliance;

        let accepted = match intent {
            UserIntent::Start => {
                if self.display > 0
                    && matches!(appliance, ApplianceState::Idle | ApplianceState::Pause)
                {
                    self.channel.start(self.display);
                    self.hold_controls();
                    true
                } else {
                    false
                }
            }
            UserIntent::Pause => {
                if appliance == ApplianceState::Running {
                    self.channel.pause();
                    self.hold_controls();
                    true
                } else {
                    false
                }
            }
            UserIntent::Stop => {
                if appliance.is_active() {
                    self.channel.stop();
                    self.session.stop_session();
                    self.session.dial(0);
                    self.set_display(0);
                    self.hold_controls();
                    true
                } else {
                    false
                }
            }
            UserIntent::AddTime { delta } => match self.edit(delta) {
                Some(applied) => {
                    if appliance.is_active() {
                        self.channel.add_time(applied);
                        self.session.add_time(applied);
                    } else {
                        self.session.dial(self.display);
                    }
                    true
                }
                None => false,
            },
        };

        if accepted {
            info!("Intent {:?} accepted while appliance {:?}", intent, appliance);
            IntentOutcome::Accepted
        } else {
            debug!(
                "Intent {:?} rejected while appliance {:?} with {}s shown",
                intent, appliance, self.display
            );
            IntentOutcome::Rejected
        }
    }

    /// Apply a dial change to the display, returning the delta actually applied
    fn edit(&mut self, delta: i64) -> Option<i64> {
        let current = self.display;
        let target = if delta > 0 {
            if current >= self.max_seconds {
                return None;
            }
            current.saturating_add(delta.unsigned_abs()).min(self.max_seconds)
        } else if delta < 0 {
            current.checked_sub(delta.unsigned_abs())?
        } else {
            return None;
        };

        self.set_display(target);
        Some(target as i64 - current as i64)
    }

    fn hold_controls(&mut self) {
        self.await_state_change = true;
        if self.controls_enabled {
            self.controls_enabled = false;
            self.emit(PanelEvent::ControlsEnabled { enabled: false });
        }
    }

    fn release_controls(&mut self) {
        self.await_state_change = false;
        if !self.controls_enabled {
            self.controls_enabled = true;
            self.emit(PanelEvent::ControlsEnabled { enabled: true });
        }
    }

    fn set_display(&mut self, remaining: u64) {
        if self.display != remaining {
            self.display = remaining;
            self.emit(PanelEvent::Display { remaining });
        }
    }

    fn set_connection(&mut self, status: ConnectionStatus) {
        if self.connection != status {
            self.connection = status;
            self.emit(PanelEvent::Connection { status });
        }
    }

    fn emit(&self, event: PanelEvent) {
        let _ = self.events_tx.send(event);
    }

    fn view(&self) -> PanelView {
        PanelView {
            connection: self.connection,
            appliance: self.appliance,
            remaining: self.display,
            remaining_text: format_remaining(self.display),
            controls_enabled: self.controls_enabled,
            last_status_at: self.last_status_at,
        }
    }

    fn publish(&self) {
        if let Some(view_tx) = &self.view_tx {
            view_tx.send_replace(self.view());
        }
    }
}

fn next_pending<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Option<T> {
    loop {
        match rx.try_recv() {
            Ok(item) => return Some(item),
            Err(TryRecvError::Lagged(missed)) => debug!("Skipped {} queued events", missed),
            Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
        }
    }
}

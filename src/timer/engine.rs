//! Countdown engine
//!
//! A single ticking clock. Each run owns one interval task; every state change and every
//! emitted event happens under the same lock, so once `pause()` or `reset()` returns no
//! tick from the cancelled run can reach an observer.
//!
//! ```text
//! Unset --configure--> Set --start--> Running --pause--> Paused --start--> Running
//! Running --tick(0)--> Unset (+Finished)
//! {Set, Running, Paused} --reset--> Unset
//! ```

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use serde::Serialize;
use tokio::{
    runtime::Handle,
    sync::broadcast,
    task::JoinHandle,
    time::{interval_at, Instant},
};
use tracing::{debug, info, trace, warn};

use crate::state::{CountdownSnapshot, CountdownState};

/// Period between two ticks
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Capacity of the event bus; receivers further behind than this observe `Lagged`
pub const EVENT_CAPACITY: usize = 256;

/// Events emitted by the engine, in the order the state changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CountdownEvent {
    Started { remaining: u64 },
    Paused { remaining: u64 },
    Adjusted { remaining: u64 },
    Reset,
    Tick { remaining: u64 },
    Finished,
}

impl CountdownEvent {
    /// Remaining time carried by the event, if any
    pub fn remaining(&self) -> Option<u64> {
        match *self {
            Self::Started { remaining }
            | Self::Paused { remaining }
            | Self::Adjusted { remaining }
            | Self::Tick { remaining } => Some(remaining),
            Self::Reset => None,
            Self::Finished => Some(0),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: CountdownState,
    remaining: u64,
    /// Bumped on every start/pause/reset; a tick task only acts for its own run
    run: u64,
    ticker: Option<JoinHandle<()>>,
}

impl Inner {
    fn cancel_ticker(&mut self) {
        self.run += 1;
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

/// Handle to a countdown engine. Clones share the same clock.
///
/// `start()` spawns its tick source onto the current tokio runtime; outside one it is ignored.
#[derive(Debug, Clone)]
pub struct CountdownEngine {
    inner: Arc<Mutex<Inner>>,
    events_tx: broadcast::Sender<CountdownEvent>,
    period: Duration,
}

impl CountdownEngine {
    /// Create an unset engine ticking once per second
    pub fn new() -> Self {
        Self::with_period(TICK_PERIOD)
    }

    /// Create an unset engine with a custom tick period
    pub fn with_period(period: Duration) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            events_tx,
            period,
        }
    }

    /// Subscribe to engine events
    pub fn subscribe(&self) -> broadcast::Receiver<CountdownEvent> {
        self.events_tx.subscribe()
    }

    pub fn snapshot(&self) -> CountdownSnapshot {
        let inner = lock(&self.inner);
        CountdownSnapshot::new(inner.state, inner.remaining)
    }

    pub fn state(&self) -> CountdownState {
        lock(&self.inner).state
    }

    pub fn remaining(&self) -> u64 {
        lock(&self.inner).remaining
    }

    /// Set the duration. Ignored while running or paused so an active countdown is never clobbered.
    pub fn configure(&self, seconds: u64) {
        let mut inner = lock(&self.inner);
        if inner.state.is_active() {
            debug!("Ignoring configure({}) while {:?}", seconds, inner.state);
            return;
        }

        inner.remaining = seconds;
        inner.state = CountdownState::Set;
        debug!("Countdown configured for {}s", seconds);
    }

    /// Add a signed delta to the remaining time. Only valid while running or paused;
    /// the result saturates at zero and a zero is turned into `Finished` by the next tick.
    pub fn adjust(&self, delta: i64) {
        let mut inner = lock(&self.inner);
        if !inner.state.is_active() {
            debug!("Ignoring adjust({}) while {:?}", delta, inner.state);
            return;
        }

        let adjusted = inner.remaining.saturating_add_signed(delta);
        if adjusted == inner.remaining {
            return;
        }

        inner.remaining = adjusted;
        debug!("Countdown adjusted by {}s to {}s", delta, adjusted);
        self.emit(CountdownEvent::Adjusted { remaining: adjusted });
    }

    /// Move the remaining time to `seconds` in one step. An active countdown keeps its
    /// state and tick source; otherwise this behaves like `configure`.
    pub fn retarget(&self, seconds: u64) {
        let mut inner = lock(&self.inner);
        if !inner.state.is_active() {
            inner.remaining = seconds;
            inner.state = CountdownState::Set;
            debug!("Countdown configured for {}s", seconds);
            return;
        }

        if inner.remaining == seconds {
            return;
        }

        debug!("Countdown moved from {}s to {}s", inner.remaining, seconds);
        inner.remaining = seconds;
        self.emit(CountdownEvent::Adjusted { remaining: seconds });
    }

    /// Begin ticking from set or paused. No-op when already running, unset, at zero,
    /// or when there is no runtime to tick on.
    pub fn start(&self) {
        let mut inner = lock(&self.inner);
        if inner.remaining == 0
            || matches!(inner.state, CountdownState::Running | CountdownState::Unset)
        {
            debug!("Ignoring start while {:?} with {}s", inner.state, inner.remaining);
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!("No tokio runtime to tick on, countdown stays {:?}", inner.state);
            return;
        };

        inner.cancel_ticker();
        inner.state = CountdownState::Running;

        let ticker = runtime.spawn(run_ticker(
            Arc::clone(&self.inner),
            self.events_tx.clone(),
            self.period,
            inner.run,
        ));
        inner.ticker = Some(ticker);

        info!("Countdown started with {}s remaining", inner.remaining);
        self.emit(CountdownEvent::Started { remaining: inner.remaining });
    }

    /// Suspend a running countdown, keeping the remaining time exactly
    pub fn pause(&self) {
        let mut inner = lock(&self.inner);
        if inner.state != CountdownState::Running {
            debug!("Ignoring pause while {:?}", inner.state);
            return;
        }

        inner.cancel_ticker();
        inner.state = CountdownState::Paused;

        info!("Countdown paused with {}s remaining", inner.remaining);
        self.emit(CountdownEvent::Paused { remaining: inner.remaining });
    }

    /// Cancel any tick source and return to unset. Always succeeds.
    pub fn reset(&self) {
        let mut inner = lock(&self.inner);
        inner.cancel_ticker();

        if inner.state == CountdownState::Unset && inner.remaining == 0 {
            return;
        }

        inner.state = CountdownState::Unset;
        inner.remaining = 0;

        info!("Countdown reset");
        self.emit(CountdownEvent::Reset);
    }

    fn emit(&self, event: CountdownEvent) {
        // No subscribers is not an error
        let _ = self.events_tx.send(event);
    }
}

impl Default for CountdownEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Tick loop for one run of the engine
async fn run_ticker(
    inner: Arc<Mutex<Inner>>,
    events_tx: broadcast::Sender<CountdownEvent>,
    period: Duration,
    run: u64,
) {
    let mut interval = interval_at(Instant::now() + period, period);

    loop {
        interval.tick().await;

        let mut guard = lock(&inner);
        if guard.run != run || guard.state != CountdownState::Running {
            trace!("Tick for stale run {} dropped", run);
            break;
        }

        guard.remaining = guard.remaining.saturating_sub(1);

        if guard.remaining == 0 {
            guard.state = CountdownState::Unset;
            guard.ticker = None;
            info!("Countdown finished");
            let _ = events_tx.send(CountdownEvent::Finished);
            break;
        }

        trace!("Time remaining: {}s", guard.remaining);
        let _ = events_tx.send(CountdownEvent::Tick { remaining: guard.remaining });
    }
}

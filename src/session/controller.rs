//! Background countdown session
//!
//! Hosts the one countdown engine of the process and the one reconciler that drives it.
//! The session outlives any attached control surface: observers come and go through
//! `subscribe`/`attach`, the engine and its single tick source stay put.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::{
    state::{ApplianceState, CountdownSnapshot, CountdownState, StatusMessage, SyncPolicy},
    sync::{Directive, Reconciler, Reconciliation},
    timer::{CountdownEngine, CountdownEvent},
};

/// Events observers receive from a session
pub type SessionEvent = CountdownEvent;

const RECONCILED_CAPACITY: usize = 64;

#[derive(Debug)]
struct SyncSlot {
    reconciler: Reconciler,
    /// Time dialed on a control surface, the local value while no countdown exists
    dialed: u64,
}

/// Owner of the countdown lifecycle. Clones share the same session.
#[derive(Debug, Clone)]
pub struct SessionController {
    engine: CountdownEngine,
    /// Held for the whole decide-and-apply step so decisions never overlap
    sync: Arc<Mutex<SyncSlot>>,
    reconciled_tx: broadcast::Sender<Reconciliation>,
}

impl SessionController {
    pub fn new() -> Self {
        Self::with_policy(SyncPolicy::default())
    }

    pub fn with_policy(policy: SyncPolicy) -> Self {
        Self::with_engine(CountdownEngine::new(), policy)
    }

    pub fn with_engine(engine: CountdownEngine, policy: SyncPolicy) -> Self {
        let (reconciled_tx, _) = broadcast::channel(RECONCILED_CAPACITY);
        Self {
            engine,
            sync: Arc::new(Mutex::new(SyncSlot {
                reconciler: Reconciler::new(policy),
                dialed: 0,
            })),
            reconciled_tx,
        }
    }

    /// Configure the countdown (unless one is active) and run it
    pub fn start_session(&self, seconds: u64) {
        let was_hosting = self.is_hosting();
        self.engine.configure(seconds);
        self.engine.start();
        if !was_hosting && self.is_hosting() {
            info!("Session hosting countdown of {}s", self.engine.remaining());
        }
    }

    pub fn add_time(&self, delta: i64) {
        self.engine.adjust(delta);
    }

    pub fn pause_session(&self) {
        self.engine.pause();
    }

    /// Drop the countdown and release the hosting context
    pub fn stop_session(&self) {
        let was_hosting = self.is_hosting();
        self.engine.reset();
        if was_hosting {
            info!("Session stopped, hosting released");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.engine.subscribe()
    }

    /// Appliance state as of the last reconciled status
    pub fn appliance(&self) -> ApplianceState {
        self.sync.lock().unwrap_or_else(PoisonError::into_inner).reconciler.appliance()
    }

    /// Record the time dialed on a control surface. It is taken as the local time when
    /// the appliance starts before a countdown exists.
    pub fn dial(&self, seconds: u64) {
        self.sync.lock().unwrap_or_else(PoisonError::into_inner).dialed = seconds;
    }

    /// Outcomes of every status folded in by `reconcile`, in order
    pub fn subscribe_reconciled(&self) -> broadcast::Receiver<Reconciliation> {
        self.reconciled_tx.subscribe()
    }

    /// Join the in-progress session: current snapshot plus every later event.
    /// Never starts anything, so attaching twice cannot duplicate ticks.
    pub fn attach(&self) -> (CountdownSnapshot, broadcast::Receiver<SessionEvent>) {
        let events = self.engine.subscribe();
        (self.engine.snapshot(), events)
    }

    pub fn time_remaining(&self) -> u64 {
        self.engine.remaining()
    }

    pub fn snapshot(&self) -> CountdownSnapshot {
        self.engine.snapshot()
    }

    /// The hosting context is held for as long as a countdown exists.
    /// Finishing or stopping returns the engine to unset, which releases it.
    pub fn is_hosting(&self) -> bool {
        self.engine.state() != CountdownState::Unset
    }

    /// Fold an appliance status into the countdown and announce the outcome.
    ///
    /// The engine is read, the decision made and its directive applied before the next
    /// call can start.
    pub fn reconcile(&self, status: StatusMessage) -> Reconciliation {
        let mut sync = self.sync.lock().unwrap_or_else(PoisonError::into_inner);

        let local = self.engine.snapshot();
        let remaining = match local.state {
            CountdownState::Unset => sync.dialed,
            _ => local.remaining,
        };

        let outcome = sync.reconciler.reconcile(status, local.state, remaining);
        if let Some(directive) = outcome.directive {
            if matches!(directive, Directive::Start { .. } | Directive::Pause { .. }) {
                sync.dialed = 0;
            }
            self.apply(directive);
        }

        // No subscribers is not an error
        let _ = self.reconciled_tx.send(outcome);
        outcome
    }

    /// Drive the engine to the target a reconciler decided on
    pub fn apply(&self, directive: Directive) {
        debug!("Applying {:?}", directive);
        match directive {
            Directive::Start { remaining } => {
                self.engine.retarget(remaining);
                self.engine.start();
            }
            Directive::Pause { remaining } => {
                self.engine.retarget(remaining);
                self.engine.pause();
            }
            Directive::Correct { remaining } => {
                if self.engine.state().is_active() {
                    self.engine.retarget(remaining);
                }
            }
            Directive::Reset => self.stop_session(),
        }
    }

    /// Tear down on process exit
    pub fn shutdown(&self) {
        if self.is_hosting() {
            info!("Shutting down live session");
        }
        self.engine.reset();
    }
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn session_runs_to_finish_and_releases_host() {
        let session = SessionController::new();
        let mut rx = session.subscribe();

        session.start_session(3);
        assert!(session.is_hosting());

        let mut events = Vec::new();
        loop {
            let event = rx.recv().await.unwrap();
            events.push(event);
            if event == SessionEvent::Finished {
                break;
            }
        }

        assert_eq!(
            events,
            vec![
                SessionEvent::Started { remaining: 3 },
                SessionEvent::Tick { remaining: 2 },
                SessionEvent::Tick { remaining: 1 },
                SessionEvent::Finished,
            ]
        );
        assert!(!session.is_hosting());
        assert_eq!(session.time_remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn start_does_not_clobber_active_countdown() {
        let session = SessionController::new();
        session.start_session(60);
        tokio::time::sleep(Duration::from_millis(5500)).await;

        session.start_session(120);
        assert_eq!(session.time_remaining(), 55);
        session.stop_session();
    }

    #[tokio::test(start_paused = true)]
    async fn reattaching_does_not_duplicate_ticks() {
        let session = SessionController::new();
        session.start_session(30);

        let (snapshot, mut first) = session.attach();
        assert_eq!(snapshot, CountdownSnapshot::new(CountdownState::Running, 30));
        let (_, mut second) = session.attach();

        tokio::time::sleep(Duration::from_millis(2500)).await;

        for rx in [&mut first, &mut second] {
            assert_eq!(rx.try_recv().unwrap(), SessionEvent::Tick { remaining: 29 });
            assert_eq!(rx.try_recv().unwrap(), SessionEvent::Tick { remaining: 28 });
            assert!(rx.try_recv().is_err());
        }
        session.shutdown();
        assert!(!session.is_hosting());
    }

    #[tokio::test(start_paused = true)]
    async fn directives_are_idempotent() {
        let session = SessionController::new();

        session.apply(Directive::Start { remaining: 90 });
        session.apply(Directive::Start { remaining: 90 });
        assert_eq!(session.snapshot(), CountdownSnapshot::new(CountdownState::Running, 90));

        session.apply(Directive::Correct { remaining: 70 });
        session.apply(Directive::Correct { remaining: 70 });
        assert_eq!(session.time_remaining(), 70);

        session.apply(Directive::Pause { remaining: 68 });
        session.apply(Directive::Pause { remaining: 68 });
        assert_eq!(session.snapshot(), CountdownSnapshot::new(CountdownState::Paused, 68));

        session.apply(Directive::Start { remaining: 68 });
        assert!(session.snapshot().is_running());

        session.apply(Directive::Reset);
        session.apply(Directive::Reset);
        assert_eq!(session.snapshot(), CountdownSnapshot::default());
    }

    #[tokio::test(start_paused = true)]
    async fn reconcile_applies_and_announces_each_status_once() {
        let session = SessionController::new();
        let mut reconciled = session.subscribe_reconciled();

        let outcome = session.reconcile(StatusMessage::new(ApplianceState::Running, 90));
        assert!(outcome.state_changed());
        assert_eq!(outcome.directive, Some(Directive::Start { remaining: 90 }));
        assert_eq!(session.snapshot(), CountdownSnapshot::new(CountdownState::Running, 90));

        let again = session.reconcile(StatusMessage::new(ApplianceState::Running, 90));
        assert!(!again.state_changed());
        assert_eq!(again.directive, None);

        assert_eq!(reconciled.try_recv().unwrap(), outcome);
        assert_eq!(reconciled.try_recv().unwrap(), again);
        assert!(reconciled.try_recv().is_err());
        session.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn dialed_time_is_kept_when_appliance_starts_close_to_it() {
        let session = SessionController::new();
        session.dial(130);

        let outcome = session.reconcile(StatusMessage::new(ApplianceState::Running, 129));
        assert_eq!(outcome.directive, Some(Directive::Start { remaining: 130 }));
        assert_eq!(session.time_remaining(), 130);

        session.reconcile(StatusMessage::new(ApplianceState::Idle, 0));
        assert!(!session.is_hosting());

        // Consumed by the first start
        let outcome = session.reconcile(StatusMessage::new(ApplianceState::Running, 131));
        assert_eq!(outcome.directive, Some(Directive::Start { remaining: 131 }));
        session.shutdown();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_corrections_do_not_compound() {
        let session = SessionController::new();
        session.apply(Directive::Start { remaining: 600 });

        for round in 0..200u64 {
            let target = 300 - round;
            let barrier = Arc::new(std::sync::Barrier::new(2));
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let session = session.clone();
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        barrier.wait();
                        session.apply(Directive::Correct { remaining: target });
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            let remaining = session.time_remaining();
            assert!(remaining == target || remaining == target - 1, "{remaining} vs {target}");
        }
        session.shutdown();
    }

    #[test]
    fn correct_is_ignored_without_countdown() {
        let session = SessionController::new();
        session.apply(Directive::Correct { remaining: 40 });
        assert_eq!(session.snapshot(), CountdownSnapshot::default());
    }
}

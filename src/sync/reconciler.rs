//! Reconciliation between the appliance's reported state and the local countdown
//!
//! The reconciler only decides. Its host supplies the local view (engine state and the
//! remaining time it trusts) and applies the returned directive. Directives carry
//! absolute targets, so applying the same one twice is harmless.

use serde::Serialize;
use tracing::debug;

use crate::state::{ApplianceState, CountdownState, StatusMessage, SyncPolicy};

/// What the countdown engine should do after a status update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Directive {
    /// Bring the remaining time to `remaining`, then run
    Start { remaining: u64 },
    /// Bring the remaining time to `remaining`, then pause
    Pause { remaining: u64 },
    /// Running countdown drifted; move it to `remaining` without restarting
    Correct { remaining: u64 },
    /// Appliance stopped; drop the countdown
    Reset,
}

/// Result of one reconciliation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    pub previous: ApplianceState,
    pub current: ApplianceState,
    pub directive: Option<Directive>,
    /// Remaining time the host should show from now on
    pub display: u64,
}

impl Reconciliation {
    pub fn state_changed(&self) -> bool {
        self.previous != self.current
    }
}

/// Tracks the last known appliance state and turns status updates into directives
#[derive(Debug, Clone)]
pub struct Reconciler {
    policy: SyncPolicy,
    appliance: ApplianceState,
}

impl Reconciler {
    pub fn new(policy: SyncPolicy) -> Self {
        Self {
            policy,
            appliance: ApplianceState::Idle,
        }
    }

    /// Last state reported by the appliance
    pub fn appliance(&self) -> ApplianceState {
        self.appliance
    }

    pub fn policy(&self) -> SyncPolicy {
        self.policy
    }

    /// Fold one status message into the recorded state.
    ///
    /// `engine` is the local countdown state and `local` the remaining time the host
    /// currently trusts: the engine's own value, or the dialed time before a countdown exists.
    pub fn reconcile(
        &mut self,
        status: StatusMessage,
        engine: CountdownState,
        local: u64,
    ) -> Reconciliation {
        let previous = self.appliance;
        let reported = status.remaining;

        let (directive, display) = if status.state == previous {
            self.drift(status, engine, local)
        } else {
            match status.state {
                ApplianceState::Running => {
                    let target = self.transition_target(local, reported);
                    (Some(Directive::Start { remaining: target }), target)
                }
                ApplianceState::Pause => {
                    let target = self.transition_target(local, reported);
                    (Some(Directive::Pause { remaining: target }), target)
                }
                ApplianceState::Idle => self.idle(engine, local, reported),
            }
        };

        self.appliance = status.state;

        debug!(
            "Reconciled {:?} -> {:?} (local {}s, reported {}s): {:?}",
            previous, status.state, local, reported, directive
        );

        Reconciliation {
            previous,
            current: status.state,
            directive,
            display,
        }
    }

    /// Keep local time unless it is further than the transition tolerance from the report
    fn transition_target(&self, local: u64, reported: u64) -> u64 {
        if local.abs_diff(reported) > self.policy.transition_tolerance {
            reported
        } else {
            local
        }
    }

    fn drift(
        &self,
        status: StatusMessage,
        engine: CountdownState,
        local: u64,
    ) -> (Option<Directive>, u64) {
        let drifted = status.state == ApplianceState::Running
            && engine == CountdownState::Running
            && local.abs_diff(status.remaining) > self.policy.drift_tolerance;

        if drifted {
            (Some(Directive::Correct { remaining: status.remaining }), status.remaining)
        } else {
            (None, local)
        }
    }

    /// An idle report close to zero is usually the appliance finishing a moment before
    /// the local countdown; only a running countdown can still finish on its own.
    fn idle(&self, engine: CountdownState, local: u64, reported: u64) -> (Option<Directive>, u64) {
        // Narrower than a plain tolerance check on purpose: a paused or merely set
        // countdown would never reach zero by itself, so it is reset even when close.
        let finishing = engine == CountdownState::Running
            && local.saturating_sub(reported) <= self.policy.idle_confirmation;

        if finishing {
            (None, local)
        } else if engine == CountdownState::Unset {
            (None, reported)
        } else {
            (Some(Directive::Reset), reported)
        }
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(SyncPolicy::default())
    }
}

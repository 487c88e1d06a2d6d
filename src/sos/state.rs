use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::dispatch::FakeCall;
use crate::models::{DispatchOutcome, SensorSnapshot, SosPhase, SosSession};

/// What the presentation shell renders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SosSnapshot {
    pub session: SosSession,
    pub alarm_active: bool,
    pub sensors: SensorSnapshot,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "event", content = "payload")]
pub enum SosEvent {
    StateChanged(SosSnapshot),
    #[serde(rename_all = "camelCase")]
    Tick { session_id: String, remaining: u32 },
    #[serde(rename_all = "camelCase")]
    OutcomeRecorded { session_id: String, outcome: DispatchOutcome },
    FakeCallIncoming(FakeCall),
    Unavailable { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Countdown(u32),
    /// Window ran out; the timer handle is already gone and the phase is `Dispatching`.
    Expired,
    /// Tick for a session that is no longer arming. The ticker should exit.
    Stale,
}

/// Session plus the single countdown handle. Both live under one lock so
/// clearing the handle and leaving `Arming` happen as one step.
pub struct SosCore {
    pub session: SosSession,
    ticker: Option<JoinHandle<()>>,
}

impl SosCore {
    pub fn new() -> Self {
        Self {
            session: SosSession::new(),
            ticker: None,
        }
    }

    pub fn phase(&self) -> SosPhase {
        self.session.phase
    }

    pub fn is_idle(&self) -> bool {
        self.session.phase == SosPhase::Idle
    }

    pub fn begin(&mut self, session_id: String, armed_at: DateTime<Utc>) {
        self.clear_ticker();
        self.session.begin(session_id, armed_at);
    }

    pub fn install_ticker(&mut self, handle: JoinHandle<()>) {
        self.clear_ticker();
        self.ticker = Some(handle);
    }

    pub fn tick(&mut self, session_id: &str) -> TickOutcome {
        if !self.session.is_current(session_id) {
            return TickOutcome::Stale;
        }
        let SosPhase::Arming { remaining } = self.session.phase else {
            return TickOutcome::Stale;
        };

        let remaining = remaining.saturating_sub(1);
        if remaining > 0 {
            self.session.phase = SosPhase::Arming { remaining };
            return TickOutcome::Countdown(remaining);
        }

        // The caller is the ticker itself: drop the handle, do not abort it.
        self.ticker.take();
        self.session.phase = SosPhase::Dispatching;
        TickOutcome::Expired
    }

    /// Leaves `Arming` for `Cancelled`. Returns false (and changes nothing)
    /// from any other phase.
    pub fn cancel(&mut self) -> bool {
        if !self.session.phase.is_arming() {
            return false;
        }
        self.clear_ticker();
        self.session.phase = SosPhase::Cancelled;
        true
    }

    pub fn finish_cancel(&mut self) {
        if self.session.phase == SosPhase::Cancelled {
            self.session.reset();
        }
    }

    /// Skips the rest of the countdown. Used when the view goes away under
    /// a dispatch-now shutdown policy.
    pub fn expire_now(&mut self) -> Option<String> {
        if !self.session.phase.is_arming() {
            return None;
        }
        self.clear_ticker();
        self.session.phase = SosPhase::Dispatching;
        self.session.id.clone()
    }

    pub fn mark_active(&mut self, session_id: &str, at: DateTime<Utc>) -> bool {
        if !self.session.is_current(session_id) || self.session.phase != SosPhase::Dispatching {
            return false;
        }
        self.session.phase = SosPhase::Active;
        self.session.dispatched_at = Some(at);
        true
    }

    /// Accepts outcomes only for the live session while it is dispatching or active.
    pub fn record(&mut self, session_id: &str, outcome: DispatchOutcome) -> bool {
        let accepting = matches!(self.session.phase, SosPhase::Dispatching | SosPhase::Active);
        if !accepting || !self.session.is_current(session_id) {
            return false;
        }
        self.session.record(outcome)
    }

    pub fn reset(&mut self) -> bool {
        if self.session.phase != SosPhase::Active {
            return false;
        }
        self.session.reset();
        true
    }

    fn clear_ticker(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}

impl Drop for SosCore {
    fn drop(&mut self) {
        self.clear_ticker();
    }
}

use std::{
    sync::{Arc, Mutex, MutexGuard, Weak},
    time::Duration,
};

use chrono::Utc;
use log::{debug, info, warn};
use tokio::{
    runtime::Handle,
    sync::broadcast,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use uuid::Uuid;

use crate::{
    audio::Alarm,
    dispatch::{issue_all, share_message, DispatchChannel, DispatchContext, FakeCall, FakeCallAction},
    error::SosError,
    models::{DispatchOutcome, SosPhase},
    platform::IdentityProvider,
    sensing::SensorReader,
    settings::{ShutdownPolicy, SosSettings},
};

use super::state::{SosCore, SosEvent, SosSnapshot, TickOutcome};

const EVENT_CAPACITY: usize = 128;

/// Collaborators the coordinator drives. All injectable so tests can swap in
/// deterministic fakes.
pub struct SosDependencies {
    pub alarm: Arc<dyn Alarm>,
    pub channels: Vec<Arc<dyn DispatchChannel>>,
    pub sensors: SensorReader,
    pub identity: Arc<dyn IdentityProvider>,
}

struct SosInner {
    core: Mutex<SosCore>,
    alarm: Arc<dyn Alarm>,
    channels: Vec<Arc<dyn DispatchChannel>>,
    sensors: SensorReader,
    identity: Arc<dyn IdentityProvider>,
    settings: SosSettings,
    fake_call: FakeCallAction,
    events: broadcast::Sender<SosEvent>,
    runtime: Option<Handle>,
    tick_interval: Duration,
}

impl Drop for SosInner {
    fn drop(&mut self) {
        // Ticker is aborted by SosCore's own drop; the siren must not outlive us.
        self.alarm.stop();
    }
}

/// The SOS state machine: a cancellable countdown that fires every dispatch
/// channel exactly once per armed session.
#[derive(Clone)]
pub struct SosController {
    inner: Arc<SosInner>,
}

impl SosController {
    pub fn new(settings: SosSettings, deps: SosDependencies) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(SosInner {
                core: Mutex::new(SosCore::new()),
                alarm: deps.alarm,
                channels: deps.channels,
                sensors: deps.sensors,
                identity: deps.identity,
                fake_call: FakeCallAction::new(settings.fake_call.clone()),
                settings,
                events,
                runtime: Handle::try_current().ok(),
                tick_interval: Duration::from_secs(1),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SosEvent> {
        self.inner.events.subscribe()
    }

    pub fn snapshot(&self) -> SosSnapshot {
        let core = self.lock_core();
        self.snapshot_of(&core)
    }

    /// Starts the countdown and the alarm. Calling it while a session exists
    /// is ignored and returns the current snapshot.
    pub fn arm(&self) -> Result<SosSnapshot, SosError> {
        let Some(runtime) = self.inner.runtime.clone() else {
            warn!("SOS unavailable: no runtime to drive the countdown");
            self.emit(SosEvent::Unavailable {
                reason: SosError::SchedulerUnavailable.to_string(),
            });
            return Err(SosError::SchedulerUnavailable);
        };

        let mut core = self.lock_core();
        if !core.is_idle() {
            debug!("arm ignored while {}", core.phase().as_str());
            return Ok(self.snapshot_of(&core));
        }

        let session_id = Uuid::new_v4().to_string();
        core.begin(session_id.clone(), Utc::now());
        let handle = runtime.spawn(ticker_loop(
            Arc::downgrade(&self.inner),
            session_id.clone(),
            self.inner.tick_interval,
        ));
        core.install_ticker(handle);

        // Started under the lock so a racing cancel always sees a running alarm.
        if let Err(err) = self.inner.alarm.start() {
            warn!("Alarm failed to start ({err}); countdown continues without sound");
        }

        info!("SOS armed (session {session_id})");
        let snapshot = self.snapshot_of(&core);
        self.emit(SosEvent::StateChanged(snapshot.clone()));
        Ok(snapshot)
    }

    /// Aborts the countdown. No-op outside `Arming`.
    pub fn cancel(&self) -> SosSnapshot {
        let mut core = self.lock_core();
        if !core.cancel() {
            debug!("cancel ignored while {}", core.phase().as_str());
            return self.snapshot_of(&core);
        }
        self.inner.alarm.stop();
        info!("SOS cancelled");
        self.emit(SosEvent::StateChanged(self.snapshot_of(&core)));

        core.finish_cancel();
        let snapshot = self.snapshot_of(&core);
        self.emit(SosEvent::StateChanged(snapshot.clone()));
        snapshot
    }

    /// Acknowledges an active SOS and returns to `Idle`. No-op otherwise.
    pub fn reset(&self) -> SosSnapshot {
        let mut core = self.lock_core();
        if !core.reset() {
            debug!("reset ignored while {}", core.phase().as_str());
            return self.snapshot_of(&core);
        }
        info!("SOS acknowledged; back to idle");
        let snapshot = self.snapshot_of(&core);
        self.emit(SosEvent::StateChanged(snapshot.clone()));
        snapshot
    }

    /// Schedules a decoy incoming call. Independent of the SOS session.
    pub fn fake_call(&self) -> FakeCall {
        let call = self.inner.fake_call.plan();
        info!("Fake call from {} in {}s", call.caller, call.ring_in_secs);

        let events = self.inner.events.clone();
        let ringing = call.clone();
        match &self.inner.runtime {
            Some(runtime) => {
                runtime.spawn(async move {
                    time::sleep(ringing.ring_delay()).await;
                    let _ = events.send(SosEvent::FakeCallIncoming(ringing));
                });
            }
            None => {
                let _ = events.send(SosEvent::FakeCallIncoming(ringing));
            }
        }
        call
    }

    /// Tears the coordinator down when the safety view goes away. A session
    /// still counting down is abandoned or dispatched per the configured policy.
    pub async fn shutdown(&self) {
        let policy = self.inner.settings.shutdown_policy;
        let pending = {
            let mut core = self.lock_core();
            match (core.phase(), policy) {
                (SosPhase::Arming { .. }, ShutdownPolicy::Abandon) => {
                    core.cancel();
                    self.inner.alarm.stop();
                    warn!("SOS countdown abandoned on shutdown");
                    self.emit(SosEvent::StateChanged(self.snapshot_of(&core)));
                    core.finish_cancel();
                    self.emit(SosEvent::StateChanged(self.snapshot_of(&core)));
                    None
                }
                (SosPhase::Arming { .. }, ShutdownPolicy::DispatchNow) => {
                    let session_id = core.expire_now();
                    self.inner.alarm.stop();
                    warn!("SOS countdown cut short on shutdown; dispatching now");
                    self.emit(SosEvent::StateChanged(self.snapshot_of(&core)));
                    session_id
                }
                _ => None,
            }
        };
        self.inner.alarm.stop();

        if let Some(session_id) = pending {
            for handle in self.dispatch(&session_id) {
                let _ = handle.await;
            }
        }
    }

    fn on_tick(&self, session_id: &str) -> bool {
        {
            let mut core = self.lock_core();
            match core.tick(session_id) {
                TickOutcome::Stale => return false,
                TickOutcome::Countdown(remaining) => {
                    debug!("SOS countdown: {remaining}");
                    self.emit(SosEvent::Tick {
                        session_id: session_id.to_string(),
                        remaining,
                    });
                    self.emit(SosEvent::StateChanged(self.snapshot_of(&core)));
                    return true;
                }
                TickOutcome::Expired => {
                    // Leaving Arming: silence first, then anything else.
                    self.inner.alarm.stop();
                    self.emit(SosEvent::Tick {
                        session_id: session_id.to_string(),
                        remaining: 0,
                    });
                    info!("SOS countdown expired; dispatching session {session_id}");
                    self.emit(SosEvent::StateChanged(self.snapshot_of(&core)));
                }
            }
        }

        // Channels run detached; the ticker is done either way.
        drop(self.dispatch(session_id));
        false
    }

    /// Issues every channel against the freshest sensor snapshot and moves
    /// straight to `Active` without waiting for any of them.
    fn dispatch(&self, session_id: &str) -> Vec<JoinHandle<()>> {
        let settings = &self.inner.settings;
        let location = self.inner.sensors.location();
        let share_text = share_message(
            location.as_ref(),
            &settings.location_share.map_base_url,
            &settings.emergency_number,
            &settings.contacts,
        );
        let ctx = Arc::new(DispatchContext {
            session_id: session_id.to_string(),
            triggered_at: Utc::now(),
            location,
            user_id: self.inner.identity.current_user_id(),
            emergency_number: settings.emergency_number.clone(),
            contacts: settings.contacts.clone(),
            share_text: share_text.clone(),
        });

        {
            let mut core = self.lock_core();
            if !core.session.is_current(session_id) || core.phase() != SosPhase::Dispatching {
                return Vec::new();
            }
            core.session.issued_channels = self.inner.channels.iter().map(|c| c.kind()).collect();
            core.session.share_text = Some(share_text);
        }

        let weak = Arc::downgrade(&self.inner);
        let owner = session_id.to_string();
        let handles = issue_all(
            &self.inner.channels,
            ctx,
            settings.channel_timeout(),
            move |outcome| {
                if let Some(inner) = weak.upgrade() {
                    SosController { inner }.record_outcome(&owner, outcome);
                }
            },
        );

        let mut core = self.lock_core();
        if core.mark_active(session_id, Utc::now()) {
            info!(
                "SOS active: {} channel(s) issued for session {session_id}",
                handles.len()
            );
            self.emit(SosEvent::StateChanged(self.snapshot_of(&core)));
        }
        handles
    }

    fn record_outcome(&self, session_id: &str, outcome: DispatchOutcome) {
        let mut core = self.lock_core();
        if !core.record(session_id, outcome.clone()) {
            debug!(
                "Discarding {} outcome for stale session {session_id}",
                outcome.channel.as_str()
            );
            return;
        }
        self.emit(SosEvent::OutcomeRecorded {
            session_id: session_id.to_string(),
            outcome,
        });
        self.emit(SosEvent::StateChanged(self.snapshot_of(&core)));
    }

    fn snapshot_of(&self, core: &SosCore) -> SosSnapshot {
        SosSnapshot {
            session: core.session.clone(),
            alarm_active: self.inner.alarm.is_running(),
            sensors: self.inner.sensors.snapshot(),
        }
    }

    fn emit(&self, event: SosEvent) {
        // No subscribers is fine: the shell may not be listening yet.
        let _ = self.inner.events.send(event);
    }

    fn lock_core(&self) -> MutexGuard<'_, SosCore> {
        match self.inner.core.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

async fn ticker_loop(inner: Weak<SosInner>, session_id: String, period: Duration) {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if !(SosController { inner }).on_tick(&session_id) {
            break;
        }
    }
}

//! Deterministic doubles shared by the unit tests.

use async_trait::async_trait;
use chrono::Utc;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex, OnceLock,
};
use std::time::Duration;

use crate::audio::Alarm;
use crate::dispatch::{share_message, DispatchChannel, DispatchContext};
use crate::error::{AlarmError, ChannelError, SensorError};
use crate::models::{ChannelKind, DispatchOutcome, LocationReading, OutcomeStatus};
use crate::platform::{Dialer, ShareSheet, StaticIdentity};
use crate::sensing::{FixedLocation, SensorSources, SensorStreamManager, Unavailable};
use crate::settings::{SettingsStore, StaticLocation};
use crate::sos::{SosController, SosDependencies};
use crate::AppState;

pub fn fix(latitude: f64, longitude: f64) -> LocationReading {
    LocationReading {
        latitude,
        longitude,
        captured_at: Utc::now(),
    }
}

pub fn context(location: Option<LocationReading>) -> DispatchContext {
    DispatchContext {
        session_id: "session-test".into(),
        triggered_at: Utc::now(),
        location,
        user_id: None,
        emergency_number: "112".into(),
        contacts: Vec::new(),
        share_text: share_message(location.as_ref(), "https://maps.test/?q=", "112", &[]),
    }
}

/// Process-wide logger that keeps every record. Tests share it, so assert on
/// content unique to the test rather than on counts.
pub struct LogCapture {
    records: Mutex<Vec<(Level, String)>>,
}

impl LogCapture {
    /// Messages at `level` or more severe.
    pub fn lines_at_or_above(&self, level: Level) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|(at, _)| *at <= level)
            .map(|(_, line)| line.clone())
            .collect()
    }
}

impl Log for LogCapture {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.records
            .lock()
            .unwrap()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

static LOG_CAPTURE: OnceLock<LogCapture> = OnceLock::new();

pub fn capture_logs() -> &'static LogCapture {
    let capture = LOG_CAPTURE.get_or_init(|| LogCapture {
        records: Mutex::new(Vec::new()),
    });
    if log::set_logger(capture).is_ok() {
        log::set_max_level(LevelFilter::Trace);
    }
    capture
}

pub fn temp_settings_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("tripsafe-{}-{}.json", name, uuid::Uuid::new_v4()))
}

/// Shell state over a settings file, with denied sensors and the given channels.
pub fn app_state(
    settings_path: PathBuf,
    channels: Vec<Arc<dyn DispatchChannel>>,
    alarm: Arc<RecordingAlarm>,
) -> (AppState, SensorStreamManager) {
    let store = SettingsStore::new(settings_path).unwrap();
    let sensors = denied_sensors();
    let sos = SosController::new(
        store.current(),
        SosDependencies {
            alarm,
            channels,
            sensors: sensors.reader(),
            identity: Arc::new(StaticIdentity::anonymous()),
        },
    );
    (
        AppState {
            sos,
            settings: store,
        },
        sensors,
    )
}

/// Location denied, battery and heading unsupported. Starts without a runtime.
pub fn denied_sensors() -> SensorStreamManager {
    let mut manager = SensorStreamManager::new(SensorSources {
        location: Arc::new(Unavailable(SensorError::PermissionDenied)),
        battery: Arc::new(Unavailable(SensorError::CapabilityUnsupported)),
        heading: Arc::new(Unavailable(SensorError::CapabilityUnsupported)),
    });
    if let Err(err) = manager.start() {
        panic!("denied sensors failed to start: {err}");
    }
    manager
}

/// Started manager whose location slot already holds the given fix.
pub async fn fixed_sensors(latitude: f64, longitude: f64) -> SensorStreamManager {
    let mut manager = SensorStreamManager::new(SensorSources {
        location: Arc::new(FixedLocation(StaticLocation {
            latitude,
            longitude,
        })),
        battery: Arc::new(Unavailable(SensorError::CapabilityUnsupported)),
        heading: Arc::new(Unavailable(SensorError::CapabilityUnsupported)),
    });
    manager.start().unwrap();
    for _ in 0..10 {
        if manager.snapshot().location.is_some() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(manager.snapshot().location.is_some(), "fix never landed");
    manager
}

pub struct RecordingAlarm {
    running: AtomicBool,
    fail_start: bool,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl RecordingAlarm {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            fail_start: false,
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_start: true,
            ..Self::new()
        }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl Alarm for RecordingAlarm {
    fn start(&self) -> Result<(), AlarmError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(AlarmError::Output("no device".into()));
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Settles immediately with a fixed status.
pub struct RecordingChannel {
    kind: ChannelKind,
    status: OutcomeStatus,
    calls: AtomicUsize,
}

impl RecordingChannel {
    pub fn new(kind: ChannelKind, status: OutcomeStatus) -> Self {
        Self {
            kind,
            status,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DispatchChannel for RecordingChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn attempt(&self, _ctx: &DispatchContext) -> DispatchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        DispatchOutcome::new(self.kind, self.status, "recorded")
    }
}

/// Never settles on its own.
pub struct StallingChannel {
    kind: ChannelKind,
    calls: AtomicUsize,
}

impl StallingChannel {
    pub fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DispatchChannel for StallingChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn attempt(&self, _ctx: &DispatchContext) -> DispatchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<DispatchOutcome>().await
    }
}

/// Settles after a fixed delay.
pub struct DelayedChannel {
    kind: ChannelKind,
    delay: Duration,
    calls: AtomicUsize,
}

impl DelayedChannel {
    pub fn new(kind: ChannelKind, delay: Duration) -> Self {
        Self {
            kind,
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DispatchChannel for DelayedChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn attempt(&self, _ctx: &DispatchContext) -> DispatchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        DispatchOutcome::new(self.kind, OutcomeStatus::Succeeded, "late")
    }
}

pub struct PanickingChannel {
    kind: ChannelKind,
}

impl PanickingChannel {
    pub fn new(kind: ChannelKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl DispatchChannel for PanickingChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn attempt(&self, _ctx: &DispatchContext) -> DispatchOutcome {
        panic!("channel blew up");
    }
}

pub struct FakeDialer {
    available: bool,
    result: Result<(), ChannelError>,
    dialed: Mutex<Vec<String>>,
}

impl FakeDialer {
    pub fn available() -> Self {
        Self {
            available: true,
            result: Ok(()),
            dialed: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::available()
        }
    }

    pub fn failing(err: ChannelError) -> Self {
        Self {
            result: Err(err),
            ..Self::available()
        }
    }

    pub fn dialed(&self) -> Vec<String> {
        self.dialed.lock().unwrap().clone()
    }
}

impl Dialer for FakeDialer {
    fn is_available(&self) -> bool {
        self.available
    }

    fn dial(&self, uri: &str) -> Result<(), ChannelError> {
        self.dialed.lock().unwrap().push(uri.to_string());
        self.result.clone()
    }
}

pub struct FakeShareSheet {
    result: Result<(), ChannelError>,
    shared: Mutex<Vec<String>>,
}

impl FakeShareSheet {
    pub fn new(result: Result<(), ChannelError>) -> Self {
        Self {
            result,
            shared: Mutex::new(Vec::new()),
        }
    }

    pub fn shared(&self) -> Vec<String> {
        self.shared.lock().unwrap().clone()
    }
}

#[async_trait]
impl ShareSheet for FakeShareSheet {
    fn is_available(&self) -> bool {
        true
    }

    async fn share(&self, _title: &str, text: &str) -> Result<(), ChannelError> {
        if self.result.is_ok() {
            self.shared.lock().unwrap().push(text.to_string());
        }
        self.result.clone()
    }
}

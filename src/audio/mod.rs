pub mod siren;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::error::AlarmError;
use crate::settings::SirenSettings;

#[cfg(feature = "speaker")]
pub use engine::SirenAlarm;

/// Audible alarm driven by the SOS countdown.
///
/// `start` is idempotent. `stop` is callable from any state, including after a
/// failed `start`, and releases everything `start` acquired.
pub trait Alarm: Send + Sync {
    fn start(&self) -> Result<(), AlarmError>;
    fn stop(&self);
    fn is_running(&self) -> bool;
}

/// Alarm used when the build has no audio output.
pub struct SilentAlarm {
    running: AtomicBool,
}

impl SilentAlarm {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
        }
    }
}

impl Alarm for SilentAlarm {
    fn start(&self) -> Result<(), AlarmError> {
        self.running.store(false, Ordering::SeqCst);
        Err(AlarmError::Unsupported)
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Picks the siren engine when audio output is compiled in.
pub fn default_alarm(settings: SirenSettings) -> Arc<dyn Alarm> {
    #[cfg(feature = "speaker")]
    {
        log::info!("Using speaker siren alarm");
        Arc::new(SirenAlarm::new(settings))
    }

    #[cfg(not(feature = "speaker"))]
    {
        let _ = settings;
        log::warn!("Built without the `speaker` feature; SOS alarm will be silent");
        Arc::new(SilentAlarm::new())
    }
}

#[cfg(feature = "speaker")]
mod engine {
    use log::{error, info};
    use rodio::{OutputStream, Sink};
    use std::any::Any;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Sender},
        Arc, Mutex,
    };
    use std::thread;

    use super::siren::Siren;
    use super::Alarm;
    use crate::error::AlarmError;
    use crate::settings::SirenSettings;

    enum AlarmCommand {
        Start,
        Stop,
    }

    /// Opens the audible output on the alarm thread. Whatever it returns is
    /// held while the siren sounds and dropped to silence it.
    type OutputOpener = fn(SirenSettings) -> Result<Box<dyn Any>, AlarmError>;

    /// Everything acquired to make the siren audible. Dropping it tears the
    /// output down, so a half-built siren never outlives its `start`.
    struct ActiveSiren {
        _stream: OutputStream,
        sink: Sink,
    }

    impl ActiveSiren {
        fn open(settings: SirenSettings) -> Result<Self, AlarmError> {
            let (stream, handle) = OutputStream::try_default()
                .map_err(|e| AlarmError::Output(format!("output stream: {e}")))?;
            let sink = Sink::try_new(&handle)
                .map_err(|e| AlarmError::Output(format!("sink: {e}")))?;
            sink.set_volume(1.0);
            sink.append(Siren::new(settings));
            sink.play();
            Ok(Self {
                _stream: stream,
                sink,
            })
        }
    }

    impl Drop for ActiveSiren {
        fn drop(&mut self) {
            self.sink.stop();
        }
    }

    fn open_speaker(settings: SirenSettings) -> Result<Box<dyn Any>, AlarmError> {
        Ok(Box::new(ActiveSiren::open(settings)?))
    }

    pub struct SirenAlarm {
        settings: SirenSettings,
        open: OutputOpener,
        tx: Mutex<Option<Sender<AlarmCommand>>>,
        running: Arc<AtomicBool>,
    }

    impl SirenAlarm {
        pub fn new(settings: SirenSettings) -> Self {
            Self::with_output(settings, open_speaker)
        }

        fn with_output(settings: SirenSettings, open: OutputOpener) -> Self {
            Self {
                settings,
                open,
                tx: Mutex::new(None),
                running: Arc::new(AtomicBool::new(false)),
            }
        }

        #[cfg(test)]
        fn has_output_thread(&self) -> bool {
            match self.tx.lock() {
                Ok(guard) => guard.is_some(),
                Err(poisoned) => poisoned.into_inner().is_some(),
            }
        }

        fn ensure_thread(&self) -> Result<Sender<AlarmCommand>, AlarmError> {
            let mut guard = match self.tx.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(tx) = guard.as_ref() {
                return Ok(tx.clone());
            }

            let (tx, rx) = mpsc::channel::<AlarmCommand>();
            let running = Arc::clone(&self.running);
            let settings = self.settings;
            let open = self.open;

            // Output objects are not Send, so they live on a dedicated thread.
            thread::Builder::new()
                .name("sos-siren".to_string())
                .spawn(move || {
                    let mut active: Option<Box<dyn Any>> = None;

                    while let Ok(cmd) = rx.recv() {
                        match cmd {
                            AlarmCommand::Start => {
                                if active.is_some() {
                                    continue;
                                }
                                match open(settings) {
                                    Ok(output) => {
                                        info!("Siren output started");
                                        active = Some(output);
                                    }
                                    Err(err) => {
                                        error!("Siren failed to start: {err}");
                                        running.store(false, Ordering::SeqCst);
                                    }
                                }
                            }
                            AlarmCommand::Stop => {
                                if active.take().is_some() {
                                    info!("Siren output stopped");
                                }
                                running.store(false, Ordering::SeqCst);
                            }
                        }
                    }
                })
                .map_err(|e| AlarmError::Output(e.to_string()))?;

            *guard = Some(tx.clone());
            Ok(tx)
        }
    }

    impl Alarm for SirenAlarm {
        fn start(&self) -> Result<(), AlarmError> {
            if self.running.swap(true, Ordering::SeqCst) {
                return Ok(());
            }
            let sent = self
                .ensure_thread()
                .and_then(|tx| {
                    tx.send(AlarmCommand::Start)
                        .map_err(|e| AlarmError::Output(e.to_string()))
                });
            if sent.is_err() {
                self.stop();
            }
            sent
        }

        fn stop(&self) {
            self.running.store(false, Ordering::SeqCst);
            let guard = match self.tx.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(tx) = guard.as_ref() {
                let _ = tx.send(AlarmCommand::Stop);
            }
        }

        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }
    }

    impl Drop for SirenAlarm {
        fn drop(&mut self) {
            self.stop();
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::sync::atomic::AtomicUsize;
        use std::time::{Duration, Instant};

        fn wait_until(mut done: impl FnMut() -> bool) -> bool {
            let deadline = Instant::now() + Duration::from_secs(2);
            while Instant::now() < deadline {
                if done() {
                    return true;
                }
                thread::sleep(Duration::from_millis(5));
            }
            done()
        }

        static SLOW_FAILURES: AtomicUsize = AtomicUsize::new(0);

        fn slow_failing_output(_: SirenSettings) -> Result<Box<dyn Any>, AlarmError> {
            thread::sleep(Duration::from_millis(100));
            SLOW_FAILURES.fetch_add(1, Ordering::SeqCst);
            Err(AlarmError::Output("no device".into()))
        }

        static FAILURES: AtomicUsize = AtomicUsize::new(0);

        fn failing_output(_: SirenSettings) -> Result<Box<dyn Any>, AlarmError> {
            FAILURES.fetch_add(1, Ordering::SeqCst);
            Err(AlarmError::Output("no device".into()))
        }

        static OPENED: AtomicUsize = AtomicUsize::new(0);
        static RELEASED: AtomicBool = AtomicBool::new(false);

        struct ReleaseFlag;

        impl Drop for ReleaseFlag {
            fn drop(&mut self) {
                RELEASED.store(true, Ordering::SeqCst);
            }
        }

        fn flagged_output(_: SirenSettings) -> Result<Box<dyn Any>, AlarmError> {
            OPENED.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ReleaseFlag))
        }

        #[test]
        fn stop_before_start_is_harmless() {
            let alarm = SirenAlarm::new(SirenSettings::default());
            alarm.stop();
            alarm.stop();
            assert!(!alarm.is_running());
            assert!(!alarm.has_output_thread());
        }

        #[test]
        fn repeated_start_opens_output_once() {
            let alarm = SirenAlarm::with_output(SirenSettings::default(), slow_failing_output);
            assert!(alarm.start().is_ok());
            assert!(alarm.start().is_ok());
            assert!(alarm.is_running());

            assert!(wait_until(|| !alarm.is_running()));
            thread::sleep(Duration::from_millis(150));
            assert_eq!(SLOW_FAILURES.load(Ordering::SeqCst), 1);
        }

        #[test]
        fn failed_output_leaves_alarm_stopped_and_restartable() {
            let alarm = SirenAlarm::with_output(SirenSettings::default(), failing_output);
            assert!(alarm.start().is_ok());
            assert!(wait_until(|| !alarm.is_running()));

            alarm.stop();
            assert!(!alarm.is_running());

            assert!(alarm.start().is_ok());
            assert!(wait_until(|| FAILURES.load(Ordering::SeqCst) == 2));
            assert!(wait_until(|| !alarm.is_running()));
        }

        #[test]
        fn stop_releases_open_output() {
            let alarm = SirenAlarm::with_output(SirenSettings::default(), flagged_output);
            assert!(alarm.start().is_ok());
            assert!(wait_until(|| OPENED.load(Ordering::SeqCst) == 1));
            assert!(alarm.is_running());
            assert!(!RELEASED.load(Ordering::SeqCst));

            alarm.stop();
            assert!(!alarm.is_running());
            assert!(wait_until(|| RELEASED.load(Ordering::SeqCst)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_alarm_reports_unsupported_and_never_runs() {
        let alarm = SilentAlarm::new();
        assert_eq!(alarm.start(), Err(AlarmError::Unsupported));
        assert!(!alarm.is_running());
        alarm.stop();
        alarm.stop();
        assert!(!alarm.is_running());
    }
}

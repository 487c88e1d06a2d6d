use anyhow::{bail, Result};
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::models::{BatteryReading, HeadingReading, LocationReading, SensorSnapshot};

use super::loop_worker::{battery_reading, heading_reading, location_reading, stream_loop};
use super::sources::{BatteryLevel, LocationFix, OrientationEvent, SensorSource};

pub struct SensorSources {
    pub location: Arc<dyn SensorSource<LocationFix>>,
    pub battery: Arc<dyn SensorSource<BatteryLevel>>,
    pub heading: Arc<dyn SensorSource<OrientationEvent>>,
}

/// Read side of the sensor slots. Cheap to clone; every read is a copy.
#[derive(Clone)]
pub struct SensorReader {
    location: watch::Receiver<Option<LocationReading>>,
    battery: watch::Receiver<Option<BatteryReading>>,
    heading: watch::Receiver<Option<HeadingReading>>,
}

impl SensorReader {
    pub fn location(&self) -> Option<LocationReading> {
        *self.location.borrow()
    }

    pub fn battery(&self) -> Option<BatteryReading> {
        *self.battery.borrow()
    }

    pub fn heading(&self) -> Option<HeadingReading> {
        *self.heading.borrow()
    }

    pub fn snapshot(&self) -> SensorSnapshot {
        SensorSnapshot {
            location: self.location(),
            battery: self.battery(),
            heading: self.heading(),
        }
    }
}

/// Owns the location, battery and heading subscriptions for as long as the
/// safety view is mounted. Each stream writes its own slot; nothing here
/// blocks a reader or raises into it.
pub struct SensorStreamManager {
    sources: SensorSources,
    location: Arc<watch::Sender<Option<LocationReading>>>,
    battery: Arc<watch::Sender<Option<BatteryReading>>>,
    heading: Arc<watch::Sender<Option<HeadingReading>>>,
    reader: SensorReader,
    handles: Vec<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl SensorStreamManager {
    pub fn new(sources: SensorSources) -> Self {
        let (location, location_rx) = watch::channel(None);
        let (battery, battery_rx) = watch::channel(None);
        let (heading, heading_rx) = watch::channel(None);

        Self {
            sources,
            location: Arc::new(location),
            battery: Arc::new(battery),
            heading: Arc::new(heading),
            reader: SensorReader {
                location: location_rx,
                battery: battery_rx,
                heading: heading_rx,
            },
            handles: Vec::new(),
            cancel_token: None,
        }
    }

    pub fn reader(&self) -> SensorReader {
        self.reader.clone()
    }

    pub fn snapshot(&self) -> SensorSnapshot {
        self.reader.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.cancel_token.is_some()
    }

    /// Subscribes to every available sensor. A refused or missing sensor only
    /// leaves its slot empty; it is not retried.
    pub fn start(&mut self) -> Result<()> {
        if self.cancel_token.is_some() {
            bail!("sensor streams already active");
        }

        let cancel_token = CancellationToken::new();

        match self.sources.location.subscribe() {
            Ok(feed) => self.handles.push(tokio::spawn(stream_loop(
                "location",
                feed,
                Arc::clone(&self.location),
                cancel_token.clone(),
                location_reading,
            ))),
            Err(err) => warn!("Location unavailable ({err}); SOS will dispatch without coordinates"),
        }

        match self.sources.battery.subscribe() {
            Ok(feed) => self.handles.push(tokio::spawn(stream_loop(
                "battery",
                feed,
                Arc::clone(&self.battery),
                cancel_token.clone(),
                battery_reading,
            ))),
            Err(err) => warn!("Battery level unavailable ({err})"),
        }

        match self.sources.heading.subscribe() {
            Ok(feed) => self.handles.push(tokio::spawn(stream_loop(
                "heading",
                feed,
                Arc::clone(&self.heading),
                cancel_token.clone(),
                heading_reading,
            ))),
            Err(err) => warn!("Heading unavailable ({err})"),
        }

        info!("Sensor streams started ({} active)", self.handles.len());
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Cancels every stream, waits for the workers to exit and clears the slots.
    pub async fn stop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        for handle in self.handles.drain(..) {
            if let Err(err) = handle.await {
                warn!("Sensor stream worker failed to join: {err}");
            }
        }

        self.location.send_replace(None);
        self.battery.send_replace(None);
        self.heading.send_replace(None);
        info!("Sensor streams stopped");
    }
}

impl Drop for SensorStreamManager {
    fn drop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::error::SensorError;
use crate::settings::StaticLocation;

/// Raw position fix as delivered by the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
}

/// Raw battery level in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryLevel(pub f64);

/// Raw device-orientation event. `alpha` is absent on devices that fire
/// orientation events without a compass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationEvent {
    pub alpha: Option<f64>,
}

/// Push feed from one platform sensor. An `Err` item ends the stream.
pub type SensorFeed<T> = mpsc::Receiver<Result<T, SensorError>>;

pub trait SensorSource<T>: Send + Sync {
    fn subscribe(&self) -> Result<SensorFeed<T>, SensorError>;
}

/// Sensor the platform refuses or does not have.
pub struct Unavailable(pub SensorError);

impl<T> SensorSource<T> for Unavailable {
    fn subscribe(&self) -> Result<SensorFeed<T>, SensorError> {
        Err(self.0.clone())
    }
}

/// Fixed desktop position from settings; delivers one fix per subscription.
pub struct FixedLocation(pub StaticLocation);

impl SensorSource<LocationFix> for FixedLocation {
    fn subscribe(&self) -> Result<SensorFeed<LocationFix>, SensorError> {
        let (tx, rx) = mpsc::channel(1);
        let fix = LocationFix {
            latitude: self.0.latitude,
            longitude: self.0.longitude,
        };
        tx.try_send(Ok(fix))
            .map_err(|err| SensorError::Platform(err.to_string()))?;
        Ok(rx)
    }
}

/// Source fed by a sender held elsewhere (platform bridge or tests).
/// The feed can be subscribed once.
pub struct FeedSource<T> {
    rx: Mutex<Option<SensorFeed<T>>>,
}

impl<T: Send> FeedSource<T> {
    pub fn new(capacity: usize) -> (mpsc::Sender<Result<T, SensorError>>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            tx,
            Self {
                rx: Mutex::new(Some(rx)),
            },
        )
    }
}

impl<T: Send> SensorSource<T> for FeedSource<T> {
    fn subscribe(&self) -> Result<SensorFeed<T>, SensorError> {
        let mut guard = match self.rx.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .take()
            .ok_or_else(|| SensorError::Platform("feed already subscribed".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_location_delivers_once_per_subscription() {
        let source = FixedLocation(StaticLocation {
            latitude: 48.8584,
            longitude: 2.2945,
        });
        for _ in 0..2 {
            let mut feed = source.subscribe().unwrap();
            let fix = feed.recv().await.unwrap().unwrap();
            assert_eq!(fix.latitude, 48.8584);
            assert!(feed.recv().await.is_none());
        }
    }

    #[test]
    fn feed_source_subscribes_once() {
        let (_tx, source) = FeedSource::<BatteryLevel>::new(4);
        assert!(source.subscribe().is_ok());
        assert!(matches!(source.subscribe(), Err(SensorError::Platform(_))));
    }

    #[test]
    fn unavailable_reports_its_reason() {
        let source = Unavailable(SensorError::PermissionDenied);
        let result: Result<SensorFeed<LocationFix>, _> = source.subscribe();
        assert_eq!(result.err(), Some(SensorError::PermissionDenied));
    }
}

pub mod controller;
pub mod loop_worker;
pub mod sources;

pub use controller::{SensorReader, SensorSources, SensorStreamManager};
pub use sources::{
    BatteryLevel, FeedSource, FixedLocation, LocationFix, OrientationEvent, SensorSource,
    Unavailable,
};

use std::sync::Arc;

use crate::error::SensorError;
use crate::settings::SosSettings;

/// Desktop sensor wiring: a configured fixed position if there is one,
/// otherwise location is treated as denied. No battery or compass API.
pub fn desktop_sources(settings: &SosSettings) -> SensorSources {
    let location: Arc<dyn SensorSource<LocationFix>> = match settings.static_location {
        Some(fixed) => Arc::new(FixedLocation(fixed)),
        None => Arc::new(Unavailable(SensorError::PermissionDenied)),
    };

    SensorSources {
        location,
        battery: Arc::new(Unavailable(SensorError::CapabilityUnsupported)),
        heading: Arc::new(Unavailable(SensorError::CapabilityUnsupported)),
    }
}

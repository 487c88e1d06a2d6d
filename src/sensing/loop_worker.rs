use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::models::{BatteryReading, HeadingReading, LocationReading};

use super::sources::{BatteryLevel, LocationFix, OrientationEvent, SensorFeed};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Pumps one sensor feed into its latest-value slot until cancelled, the
/// feed closes, or the feed reports an error. Events `convert` rejects are
/// dropped without touching the slot.
pub async fn stream_loop<T, R>(
    name: &'static str,
    mut feed: SensorFeed<T>,
    slot: Arc<watch::Sender<Option<R>>>,
    cancel_token: CancellationToken,
    convert: fn(T) -> Option<R>,
) where
    T: Send + 'static,
    R: Send + Sync + 'static,
{
    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("{name} stream shutting down");
                break;
            }
            item = feed.recv() => {
                match item {
                    Some(Ok(raw)) => match convert(raw) {
                        Some(reading) => {
                            slot.send_replace(Some(reading));
                        }
                        None => log_debug!("{name} stream ignored an unusable event"),
                    },
                    Some(Err(err)) => {
                        log_warn!("{name} stream stopped: {err}");
                        break;
                    }
                    None => {
                        log_info!("{name} stream closed by platform");
                        break;
                    }
                }
            }
        }
    }
}

pub fn location_reading(fix: LocationFix) -> Option<LocationReading> {
    let valid = fix.latitude.is_finite()
        && fix.longitude.is_finite()
        && (-90.0..=90.0).contains(&fix.latitude)
        && (-180.0..=180.0).contains(&fix.longitude);
    if !valid {
        return None;
    }
    log_debug!("location fix {:.5}, {:.5}", fix.latitude, fix.longitude);
    Some(LocationReading {
        latitude: fix.latitude,
        longitude: fix.longitude,
        captured_at: Utc::now(),
    })
}

pub fn battery_reading(level: BatteryLevel) -> Option<BatteryReading> {
    let BatteryLevel(level) = level;
    if !level.is_finite() {
        return None;
    }
    Some(BatteryReading {
        percentage: (level.clamp(0.0, 1.0) * 100.0).round() as u8,
        captured_at: Utc::now(),
    })
}

pub fn heading_reading(event: OrientationEvent) -> Option<HeadingReading> {
    let alpha = event.alpha.filter(|a| a.is_finite())?;
    Some(HeadingReading {
        degrees: alpha.rem_euclid(360.0),
        captured_at: Utc::now(),
    })
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationReading {
    pub latitude: f64,
    pub longitude: f64,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatteryReading {
    pub percentage: u8,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeadingReading {
    pub degrees: f64,
    pub captured_at: DateTime<Utc>,
}

/// Point-in-time copy of every sensor slot. `None` means "no data", never zero.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SensorSnapshot {
    pub location: Option<LocationReading>,
    pub battery: Option<BatteryReading>,
    pub heading: Option<HeadingReading>,
}

impl SensorSnapshot {
    pub fn battery_label(&self) -> String {
        match self.battery {
            Some(reading) => format!("{}%", reading.percentage),
            None => "no data".to_string(),
        }
    }

    pub fn location_label(&self) -> String {
        match self.location {
            Some(reading) => format!("{:.5}, {:.5}", reading.latitude, reading.longitude),
            None => "no location".to_string(),
        }
    }

    pub fn heading_label(&self) -> String {
        match self.heading {
            Some(reading) => format!("{:.0}°", reading.degrees),
            None => "no data".to_string(),
        }
    }
}

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock, time::Duration};

use crate::models::EmergencyContact;

pub const BACKEND_URL_ENV: &str = "TRIPSAFE_BACKEND_URL";
pub const DEBUG_ENV: &str = "TRIPSAFE_DEBUG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendLogSettings {
    /// `None` leaves the backend log channel unsupported.
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
}

impl Default for BackendLogSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SirenSettings {
    pub carrier_hz: f32,
    /// Peak frequency deviation around the carrier.
    pub sweep_hz: f32,
    /// How many full rise/fall cycles per second.
    pub wail_rate_hz: f32,
}

impl Default for SirenSettings {
    fn default() -> Self {
        Self {
            carrier_hz: 900.0,
            sweep_hz: 300.0,
            wail_rate_hz: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocationShareSettings {
    pub map_base_url: String,
}

impl Default for LocationShareSettings {
    fn default() -> Self {
        Self {
            map_base_url: "https://www.google.com/maps?q=".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FakeCallSettings {
    pub callers: Vec<String>,
    pub min_ring_delay_secs: u64,
    pub max_ring_delay_secs: u64,
}

impl Default for FakeCallSettings {
    fn default() -> Self {
        Self {
            callers: vec!["Mom".into(), "Office".into(), "Alex".into()],
            min_ring_delay_secs: 3,
            max_ring_delay_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StaticLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// What happens to a session still in its countdown when the safety view goes away.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ShutdownPolicy {
    Abandon,
    DispatchNow,
}

impl Default for ShutdownPolicy {
    fn default() -> Self {
        ShutdownPolicy::Abandon
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SosSettings {
    pub emergency_number: String,
    pub contacts: Vec<EmergencyContact>,
    pub backend_log: BackendLogSettings,
    pub channel_timeout_ms: u64,
    pub siren: SirenSettings,
    pub location_share: LocationShareSettings,
    pub fake_call: FakeCallSettings,
    pub static_location: Option<StaticLocation>,
    pub user_id: Option<String>,
    pub shutdown_policy: ShutdownPolicy,
    pub log_level: String,
}

impl Default for SosSettings {
    fn default() -> Self {
        Self {
            emergency_number: "112".into(),
            contacts: Vec::new(),
            backend_log: BackendLogSettings::default(),
            channel_timeout_ms: 15_000,
            siren: SirenSettings::default(),
            location_share: LocationShareSettings::default(),
            fake_call: FakeCallSettings::default(),
            static_location: None,
            user_id: None,
            shutdown_policy: ShutdownPolicy::default(),
            log_level: "info".into(),
        }
    }
}

impl SosSettings {
    pub fn channel_timeout(&self) -> Duration {
        Duration::from_millis(self.channel_timeout_ms)
    }

    /// Applies `TRIPSAFE_*` environment overrides on top of the file values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            if !url.trim().is_empty() {
                self.backend_log.endpoint = Some(url.trim().to_string());
            }
        }
        if debug_enabled() {
            self.log_level = "debug".into();
        }
        self
    }
}

pub fn debug_enabled() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<SosSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring unreadable settings at {}: {err}", path.display());
                SosSettings::default()
            })
        } else {
            let defaults = SosSettings::default();
            persist(&path, &defaults)?;
            info!("Wrote default settings to {}", path.display());
            defaults
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Current settings with environment overrides applied.
    pub fn current(&self) -> SosSettings {
        let guard = match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.clone().with_env_overrides()
    }

    pub fn contacts(&self) -> Vec<EmergencyContact> {
        self.current().contacts
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: SosSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid settings in {}", self.path.display()))?;
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = data;
        Ok(())
    }
}

fn persist(path: &PathBuf, data: &SosSettings) -> Result<()> {
    let serialized = serde_json::to_string_pretty(data)?;
    fs::write(path, serialized)
        .with_context(|| format!("Failed to write settings to {}", path.display()))
}

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::time::Duration;

use crate::settings::FakeCallSettings;

const FALLBACK_CALLER: &str = "Mom";

/// A scheduled decoy incoming call. Has no bearing on the SOS state machine.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FakeCall {
    pub caller: String,
    pub ring_in_secs: u64,
    pub requested_at: DateTime<Utc>,
}

impl FakeCall {
    pub fn ring_delay(&self) -> Duration {
        Duration::from_secs(self.ring_in_secs)
    }
}

pub struct FakeCallAction {
    settings: FakeCallSettings,
}

impl FakeCallAction {
    pub fn new(settings: FakeCallSettings) -> Self {
        Self { settings }
    }

    pub fn plan(&self) -> FakeCall {
        self.plan_with(&mut rand::thread_rng())
    }

    /// Picks a caller and a ring delay so the decoy does not look scripted.
    pub fn plan_with<R: Rng>(&self, rng: &mut R) -> FakeCall {
        let caller = if self.settings.callers.is_empty() {
            FALLBACK_CALLER.to_string()
        } else {
            let index = rng.gen_range(0..self.settings.callers.len());
            self.settings.callers[index].clone()
        };

        let min = self.settings.min_ring_delay_secs;
        let max = self.settings.max_ring_delay_secs.max(min);
        let ring_in_secs = rng.gen_range(min..=max);

        FakeCall {
            caller,
            ring_in_secs,
            requested_at: Utc::now(),
        }
    }
}

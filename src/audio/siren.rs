#[cfg(feature = "speaker")]
use rodio::Source;
use std::f32::consts::TAU;
#[cfg(feature = "speaker")]
use std::time::Duration;

use crate::settings::SirenSettings;

const SAMPLE_RATE: u32 = 44100;

/// Wailing siren generator.
/// A sine carrier whose frequency is swept by a slow secondary oscillator, so
/// the pitch rises and falls instead of holding a flat tone. Output is at full
/// scale; there is no volume control on an emergency alarm.
pub struct Siren {
    carrier_hz: f32,
    sweep_hz: f32,
    wail_rate_hz: f32,
    sample_rate: u32,
    carrier_phase: f32,
    wail_phase: f32,
}

impl Siren {
    pub fn new(settings: SirenSettings) -> Self {
        Self {
            carrier_hz: settings.carrier_hz.max(1.0),
            // Keep the swept frequency strictly positive.
            sweep_hz: settings.sweep_hz.abs().min(settings.carrier_hz * 0.9),
            wail_rate_hz: settings.wail_rate_hz.max(0.01),
            sample_rate: SAMPLE_RATE,
            carrier_phase: 0.0,
            wail_phase: 0.0,
        }
    }

    /// Frequency the carrier is running at right now.
    pub fn instantaneous_hz(&self) -> f32 {
        self.carrier_hz + self.sweep_hz * self.wail_phase.sin()
    }
}

impl Iterator for Siren {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let sample = self.carrier_phase.sin();

        // Phase accumulation keeps the waveform continuous while the pitch moves.
        self.carrier_phase += TAU * self.instantaneous_hz() / self.sample_rate as f32;
        if self.carrier_phase > TAU {
            self.carrier_phase -= TAU;
        }

        self.wail_phase += TAU * self.wail_rate_hz / self.sample_rate as f32;
        if self.wail_phase > TAU {
            self.wail_phase -= TAU;
        }

        Some(sample)
    }
}

#[cfg(feature = "speaker")]
impl Source for Siren {
    fn current_frame_len(&self) -> Option<usize> {
        None // Infinite stream
    }

    fn channels(&self) -> u16 {
        1 // Mono
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

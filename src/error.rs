//! Error types for the SOS subsystem.
//!
//! None of these cross into the coordinator's state machine: sensor errors
//! become `None` readings and channel errors become outcome rows at the source.

use thiserror::Error;

/// Why a sensor stream produced no (further) readings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SensorError {
    /// The user or OS refused access to the sensor
    #[error("permission denied")]
    PermissionDenied,

    /// The platform has no such sensor API
    #[error("capability unsupported")]
    CapabilityUnsupported,

    /// The platform reported an error mid-stream
    #[error("platform error: {0}")]
    Platform(String),
}

/// Errors raised inside a dispatch channel before they are turned into outcomes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// The platform lacks the API this channel needs
    #[error("capability unsupported: {0}")]
    CapabilityUnsupported(String),

    /// Network request failed before a response arrived
    #[error("network failure: {0}")]
    TransientNetworkFailure(String),

    /// Remote endpoint answered with a non-success status
    #[error("rejected with status {0}")]
    Rejected(u16),

    /// The attempt exceeded the configured channel timeout
    #[error("timed out after {0}ms")]
    Timeout(u64),

    /// Platform call failed
    #[error("platform error: {0}")]
    Platform(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AlarmError {
    #[error("audio output unsupported on this build")]
    Unsupported,

    #[error("audio output failed: {0}")]
    Output(String),
}

/// Hard failures that leave SOS unavailable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SosError {
    /// No async runtime to drive the countdown timer
    #[error("SOS unavailable: countdown scheduler could not be started")]
    SchedulerUnavailable,
}

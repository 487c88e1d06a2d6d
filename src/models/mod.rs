mod contact;
mod readings;
mod session;

pub use contact::EmergencyContact;
pub use readings::{BatteryReading, HeadingReading, LocationReading, SensorSnapshot};
pub use session::{
    ChannelKind, DispatchOutcome, OutcomeStatus, SosPhase, SosSession, ARM_WINDOW_TICKS,
};

pub mod commands;
pub mod controller;
pub mod state;

pub use controller::{SosController, SosDependencies};
pub use state::{SosEvent, SosSnapshot};

//! Heater implementations

pub mod bank;
pub mod model;

pub use bank::HeaterBank;
pub use model::{HeaterModel, SimHeater};

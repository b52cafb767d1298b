//! Heater collaborator trait
//!
//! Closed-loop temperature control is not part of this crate. The engine
//! only sets targets, switches heaters between active and standby, and
//! polls whether a heater has arrived.

use crate::motion::EXTRUDERS;

/// Heater index as seen by the heater collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HeaterId(pub u8);

impl HeaterId {
    /// Index into per-heater tables
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// The bed is always heater 0
pub const BED_HEATER: HeaterId = HeaterId(0);

/// Bed plus one heater per extruder
pub const MAX_HEATERS: usize = EXTRUDERS + 1;

/// Temperature meaning "off"
pub const ABS_ZERO: f32 = -273.15;

/// Heater driving a given extruder
///
/// Extruder heads count from 0 in legacy commands, but heater 0 is the
/// bed, so head `n` is heater `n + 1`. This is the only place that
/// mapping is made.
pub const fn heater_for_extruder(extruder: u8) -> HeaterId {
    HeaterId(extruder + 1)
}

/// Trait for the heater manager
pub trait Thermal {
    /// Set the temperature used while the heater is active
    fn set_target(&mut self, heater: HeaterId, temperature: f32);

    /// Set the temperature used while the heater is on standby
    fn set_standby_target(&mut self, heater: HeaterId, temperature: f32);

    /// Switch the heater to its active temperature
    fn set_active(&mut self, heater: HeaterId);

    /// Switch the heater to its standby temperature
    fn set_standby(&mut self, heater: HeaterId);

    /// Check if the heater is at its current target
    fn at_target(&self, heater: HeaterId) -> bool;

    /// Current measured temperature
    fn temperature(&self, heater: HeaterId) -> f32;
}

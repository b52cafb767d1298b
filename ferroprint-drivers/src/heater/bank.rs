//! Heater bank implementing the engine's heater interface

use heapless::Vec;

use ferroprint_core::traits::{HeaterId, Thermal, ABS_ZERO, BED_HEATER, MAX_HEATERS};

use super::model::{HeaterModel, SimHeater};

/// Bed plus one hot end per extruder
pub struct HeaterBank {
    heaters: [SimHeater; MAX_HEATERS],
}

impl Default for HeaterBank {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaterBank {
    /// Create a bank with the stock bed and hot-end models
    pub fn new() -> Self {
        let mut heaters = [SimHeater::new(HeaterModel::HOTEND); MAX_HEATERS];
        heaters[BED_HEATER.index()] = SimHeater::new(HeaterModel::BED);
        Self { heaters }
    }

    /// Replace the model of one heater, resetting it to ambient
    pub fn with_model(mut self, heater: HeaterId, model: HeaterModel) -> Self {
        if let Some(h) = self.heaters.get_mut(heater.index()) {
            *h = SimHeater::new(model);
        }
        self
    }

    /// One heater
    pub fn heater(&self, heater: HeaterId) -> Option<&SimHeater> {
        self.heaters.get(heater.index())
    }

    /// One heater, mutably
    pub fn heater_mut(&mut self, heater: HeaterId) -> Option<&mut SimHeater> {
        self.heaters.get_mut(heater.index())
    }

    /// Advance every heater by one time step
    ///
    /// Returns the heaters that faulted during this step.
    pub fn update(&mut self, elapsed_ms: u32) -> Vec<HeaterId, MAX_HEATERS> {
        let mut faulted = Vec::new();
        for (i, heater) in self.heaters.iter_mut().enumerate() {
            if heater.update(elapsed_ms) {
                let id = HeaterId(i as u8);
                warn!("heater {} over temperature, cut off", i);
                // Capacity equals the number of heaters
                let _ = faulted.push(id);
            }
        }
        faulted
    }
}

impl Thermal for HeaterBank {
    fn set_target(&mut self, heater: HeaterId, temperature: f32) {
        if let Some(h) = self.heater_mut(heater) {
            h.set_active_target(temperature);
        }
    }

    fn set_standby_target(&mut self, heater: HeaterId, temperature: f32) {
        if let Some(h) = self.heater_mut(heater) {
            h.set_standby_target(temperature);
        }
    }

    fn set_active(&mut self, heater: HeaterId) {
        if let Some(h) = self.heater_mut(heater) {
            h.set_active(true);
        }
    }

    fn set_standby(&mut self, heater: HeaterId) {
        if let Some(h) = self.heater_mut(heater) {
            h.set_active(false);
        }
    }

    fn at_target(&self, heater: HeaterId) -> bool {
        self.heater(heater).map_or(true, SimHeater::is_at_target)
    }

    fn temperature(&self, heater: HeaterId) -> f32 {
        self.heater(heater).map_or(ABS_ZERO, SimHeater::temperature)
    }
}

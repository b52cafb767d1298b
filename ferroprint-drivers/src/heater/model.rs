//! Bang-bang heater over a first-order thermal model
//!
//! Simple on/off control with hysteresis:
//! - Heater ON when temp < target - hysteresis
//! - Heater OFF when temp > target + hysteresis
//! - Heater stays in current state when within hysteresis band
//!
//! The plant gains `heat_rate` °C/s while powered and loses heat to
//! ambient in proportion to the temperature difference. Reaching
//! `max_temp` latches a fault and cuts power until cleared.

use ferroprint_core::traits::ABS_ZERO;

/// Thermal and control parameters of one heater
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HeaterModel {
    /// Safety cutoff
    pub max_temp: f32,
    /// Half-width of the control band
    pub hysteresis: f32,
    /// Distance from target that counts as arrived
    pub tolerance: f32,
    /// Temperature rise per second at full power, ignoring losses
    pub heat_rate: f32,
    /// Fraction of the excess over ambient lost per second
    pub loss: f32,
    /// Room temperature
    pub ambient: f32,
}

impl HeaterModel {
    /// Heated bed
    pub const BED: Self = Self {
        max_temp: 130.0,
        hysteresis: 0.5,
        tolerance: 2.0,
        heat_rate: 2.0,
        loss: 0.01,
        ambient: 20.0,
    };

    /// Hot end
    pub const HOTEND: Self = Self {
        max_temp: 285.0,
        hysteresis: 1.0,
        tolerance: 3.0,
        heat_rate: 10.0,
        loss: 0.02,
        ambient: 20.0,
    };
}

impl Default for HeaterModel {
    fn default() -> Self {
        Self::HOTEND
    }
}

/// Target temperatures count as "off" at or below this
const OFF_THRESHOLD: f32 = ABS_ZERO + 1.0;

/// One simulated heater
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SimHeater {
    model: HeaterModel,
    temperature: f32,
    active_target: f32,
    standby_target: f32,
    /// Running at the active rather than the standby target
    active: bool,
    powered: bool,
    fault: bool,
}

impl SimHeater {
    /// Create a heater at ambient temperature, off
    pub const fn new(model: HeaterModel) -> Self {
        Self {
            temperature: model.ambient,
            model,
            active_target: ABS_ZERO,
            standby_target: ABS_ZERO,
            active: false,
            powered: false,
            fault: false,
        }
    }

    /// Clamp a requested temperature to the safe range
    fn clamp(&self, temperature: f32) -> f32 {
        if temperature > self.model.max_temp {
            self.model.max_temp
        } else {
            temperature
        }
    }

    /// Set the active target (clamped to max_temp)
    pub fn set_active_target(&mut self, temperature: f32) {
        self.active_target = self.clamp(temperature);
    }

    /// Set the standby target (clamped to max_temp)
    pub fn set_standby_target(&mut self, temperature: f32) {
        self.standby_target = self.clamp(temperature);
    }

    /// Switch between active and standby targets
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// The target currently controlled to
    pub fn target(&self) -> f32 {
        if self.active {
            self.active_target
        } else {
            self.standby_target
        }
    }

    /// Current temperature
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Overwrite the temperature, as a sensor glitch or runaway would
    pub fn force_temperature(&mut self, temperature: f32) {
        self.temperature = temperature;
    }

    /// Check if the heater element is powered
    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// Check if the safety cutoff has latched
    pub fn has_fault(&self) -> bool {
        self.fault
    }

    /// Clear a latched fault
    pub fn clear_fault(&mut self) {
        self.fault = false;
    }

    /// Check if temperature is within tolerance of target
    ///
    /// A heater that is off is always "there".
    pub fn is_at_target(&self) -> bool {
        let target = self.target();
        if target <= OFF_THRESHOLD {
            return true;
        }
        let diff = self.temperature - target;
        diff >= -self.model.tolerance && diff <= self.model.tolerance
    }

    /// Run the controller and plant for one time step
    ///
    /// Returns true if this step latched a new fault.
    pub fn update(&mut self, elapsed_ms: u32) -> bool {
        let mut new_fault = false;
        if !self.fault && self.temperature >= self.model.max_temp {
            self.fault = true;
            new_fault = true;
        }

        let target = self.target();
        self.powered = if self.fault || target <= OFF_THRESHOLD {
            false
        } else if self.temperature < target - self.model.hysteresis {
            true
        } else if self.temperature > target + self.model.hysteresis {
            false
        } else {
            self.powered
        };

        let dt = elapsed_ms as f32 / 1000.0;
        let gain = if self.powered { self.model.heat_rate } else { 0.0 };
        let loss = (self.temperature - self.model.ambient) * self.model.loss;
        self.temperature += (gain - loss) * dt;
        new_fault
    }
}

//! Configuration type definitions
//!
//! Everything the engine needs to know about the machine that is not
//! changed by ordinary commands. Values that commands may override at
//! runtime (`M208` axis ranges, `M564` limit policy) start from here.

use heapless::String;

use crate::bed::MAX_PROBE_POINTS;
use crate::motion::{Axis, AXES};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum length of a directory prefix
pub const MAX_DIR_LEN: usize = 24;

/// Maximum length of a file name in configuration
pub const MAX_NAME_LEN: usize = 24;

/// Maximum length of a joined path
pub const MAX_PATH_LEN: usize = MAX_DIR_LEN + MAX_NAME_LEN + 16;

/// What to do with a move target outside the axis range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LimitPolicy {
    /// Move anyway
    Ignore,
    /// Move to the nearest point inside the range
    #[default]
    Clamp,
    /// Refuse the move
    Reject,
}

/// Per-axis travel and homing
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AxisConfig {
    /// Lowest reachable coordinate (mm)
    pub min: f32,
    /// Highest reachable coordinate (mm)
    pub max: f32,
    /// Homing feedrate (mm/s)
    pub home_feedrate: f32,
    /// Endstop sits at `max` instead of `min`
    pub homes_to_max: bool,
}

impl AxisConfig {
    /// Coordinate assigned when the endstop triggers
    pub fn home_position(&self) -> f32 {
        if self.homes_to_max {
            self.max
        } else {
            self.min
        }
    }

    /// Target far enough past the endstop that the move always reaches it
    pub fn homing_target(&self, from: f32) -> f32 {
        let span = 2.0 * (self.max - self.min);
        if self.homes_to_max {
            from + span
        } else {
            from - span
        }
    }

    /// Clamp a coordinate into the axis range
    pub fn clamp(&self, value: f32) -> f32 {
        if value < self.min {
            self.min
        } else if value > self.max {
            self.max
        } else {
            value
        }
    }

    /// Check if a coordinate lies inside the axis range
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Z probe geometry and bed probe points
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProbeConfig {
    /// Z reported by the probe when it triggers on a level bed (mm)
    pub trigger_height: f32,
    /// Z to travel at between points (mm)
    pub dive_height: f32,
    /// Lowest Z a probing move may reach (mm)
    pub travel_limit: f32,
    /// Probing feedrate (mm/s)
    pub feedrate: f32,
    /// Feedrate between points (mm/s)
    pub travel_feedrate: f32,
    /// X, Y of each bed probe point
    pub points: [(f32, f32); MAX_PROBE_POINTS],
    /// Number of entries of `points` in use
    pub point_count: u8,
}

/// Complete machine configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MachineConfig {
    /// X, Y, Z travel and homing
    pub axes: [AxisConfig; AXES],
    /// Probe and bed levelling
    pub probe: ProbeConfig,
    /// Feedrate before any `F` has been seen (mm/s)
    pub default_feedrate: f32,
    /// Out-of-range move handling
    pub limit_policy: LimitPolicy,
    /// Wait for the old tool to cool to standby during a tool change
    pub wait_for_standby: bool,
    /// Macro run by `run_configuration`
    pub config_file: String<MAX_NAME_LEN>,
    /// Directory for macro files (`M98`, config)
    pub macro_directory: String<MAX_DIR_LEN>,
    /// Directory for print files (`M23`, `M28`, `M30`)
    pub gcode_directory: String<MAX_DIR_LEN>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        let axis = |max: f32, home_feedrate: f32| AxisConfig {
            min: 0.0,
            max,
            home_feedrate,
            homes_to_max: false,
        };
        Self {
            axes: [axis(200.0, 50.0), axis(200.0, 50.0), axis(180.0, 5.0)],
            probe: ProbeConfig {
                trigger_height: 0.7,
                dive_height: 5.0,
                travel_limit: -5.0,
                feedrate: 2.0,
                travel_feedrate: 50.0,
                points: [
                    (15.0, 15.0),
                    (185.0, 15.0),
                    (100.0, 185.0),
                    (0.0, 0.0),
                    (0.0, 0.0),
                ],
                point_count: 3,
            },
            default_feedrate: 50.0,
            limit_policy: LimitPolicy::Clamp,
            wait_for_standby: false,
            config_file: fixed("config.g"),
            macro_directory: fixed("sys/"),
            gcode_directory: fixed("gcodes/"),
        }
    }
}

fn fixed<const N: usize>(text: &str) -> String<N> {
    let mut s = String::new();
    // Defaults are short literals; anything that does not fit stays empty
    let _ = s.push_str(text);
    s
}

impl MachineConfig {
    /// Settings of one axis
    pub fn axis(&self, axis: Axis) -> &AxisConfig {
        &self.axes[axis.index()]
    }

    /// Mutable settings of one axis
    pub fn axis_mut(&mut self, axis: Axis) -> &mut AxisConfig {
        &mut self.axes[axis.index()]
    }
}

/// Errors loading or storing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Blob could not be decoded
    Deserialize,
    /// Output buffer too small or value not encodable
    Serialize,
}

#[cfg(feature = "serde")]
impl MachineConfig {
    /// Decode a configuration blob
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        postcard::from_bytes(bytes).map_err(|_| ConfigError::Deserialize)
    }

    /// Encode into `buf`, returning the used prefix
    pub fn to_slice<'a>(&self, buf: &'a mut [u8]) -> Result<&'a mut [u8], ConfigError> {
        postcard::to_slice(self, buf).map_err(|_| ConfigError::Serialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MachineConfig::default();
        assert_eq!(config.limit_policy, LimitPolicy::Clamp);
        assert_eq!(config.config_file.as_str(), "config.g");
        assert_eq!(config.probe.point_count, 3);
    }

    #[test]
    fn test_homing_direction() {
        let mut axis = MachineConfig::default().axes[0];
        assert_eq!(axis.home_position(), 0.0);
        assert!(axis.homing_target(50.0) < axis.min);

        axis.homes_to_max = true;
        assert_eq!(axis.home_position(), 200.0);
        assert!(axis.homing_target(50.0) > axis.max);
    }

    #[test]
    fn test_clamp() {
        let axis = MachineConfig::default().axes[2];
        assert_eq!(axis.clamp(-1.0), 0.0);
        assert_eq!(axis.clamp(500.0), 180.0);
        assert_eq!(axis.clamp(12.5), 12.5);
        assert!(!axis.contains(180.5));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_postcard_blob() {
        let mut config = MachineConfig::default();
        config.limit_policy = LimitPolicy::Reject;
        config.axes[1].homes_to_max = true;

        let mut buf = [0u8; 256];
        let used = config.to_slice(&mut buf).unwrap().len();
        let decoded = MachineConfig::from_bytes(&buf[..used]).unwrap();
        assert_eq!(decoded, config);

        assert_eq!(
            MachineConfig::from_bytes(&buf[..used / 2]),
            Err(ConfigError::Deserialize)
        );
    }
}

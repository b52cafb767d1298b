//! Move staging (`G0`, `G1`, `G92`)

use super::{Engine, Io, Outcome};
use crate::config::LimitPolicy;
use crate::error::CommandError;
use crate::gcode::LineBuffer;
use crate::motion::{Axis, PendingMove, EXTRUDERS};

impl Engine {
    /// `G0` / `G1`
    ///
    /// Held (`Pending`) while the previous move has not been taken.
    pub(super) fn setup_move(&mut self, line: &mut LineBuffer) -> Result<Outcome, CommandError> {
        if !self.slot.is_free() {
            return Ok(Outcome::Pending);
        }
        let mv = self.load_move(line)?;
        if mv.active.iter().any(|&a| a) {
            self.slot.stage(mv);
        }
        Ok(Outcome::Done)
    }

    /// Build a move from the fields of a `G0` / `G1` line
    fn load_move(&mut self, line: &mut LineBuffer) -> Result<PendingMove, CommandError> {
        // Modal feedrate is committed only once the whole line is accepted
        let feedrate = if line.seen(b'F') {
            line.get_float()? * self.distance_scale / 60.0
        } else {
            self.modal.feedrate
        };

        let mut mv = PendingMove::from_position(self.slot.position(), feedrate);
        let offsets = self.tools.current_offsets();
        for axis in Axis::ALL {
            if !line.seen(axis.letter()) {
                continue;
            }
            let value = line.get_float()? * self.distance_scale;
            let target = if self.modal.axes_relative {
                self.slot.axis_position(axis) + value
            } else {
                value - offsets[axis.index()]
            };
            mv.set_axis(axis, self.limit(axis, target)?);
        }

        if line.seen(b'S') {
            mv.check_endstops = line.get_int()? == 1;
        }

        if line.seen(b'E') {
            self.load_extrusion(line, &mut mv)?;
        }
        self.modal.feedrate = feedrate;
        Ok(mv)
    }

    /// Apply the axis-limit policy to a target
    ///
    /// Only homed axes are limited: before homing the position is not
    /// known, so the range means nothing.
    fn limit(&self, axis: Axis, target: f32) -> Result<f32, CommandError> {
        if !self.slot.is_homed(axis) {
            return Ok(target);
        }
        let range = self.config.axis(axis);
        match self.config.limit_policy {
            LimitPolicy::Ignore => Ok(target),
            LimitPolicy::Clamp => Ok(range.clamp(target)),
            LimitPolicy::Reject if range.contains(target) => Ok(target),
            LimitPolicy::Reject => Err(CommandError::AxisLimit(axis)),
        }
    }

    /// Fill extruder drive amounts from the `E` field
    ///
    /// A single value is split over the selected tool's drives by its mix
    /// ratio; a colon list gives one value per drive. With no tool
    /// selected, `E` drives extruder 0.
    fn load_extrusion(&mut self, line: &mut LineBuffer, mv: &mut PendingMove) -> Result<(), CommandError> {
        let mut values = [0.0f32; EXTRUDERS];
        let count = line.get_float_array(&mut values)?;

        let mut drives = [0u8; EXTRUDERS];
        let (drive_count, mix) = match self.tools.current() {
            Some(tool) => {
                drives[..tool.drives().len()].copy_from_slice(tool.drives());
                (tool.drives().len(), tool.mix())
            }
            None => (1, 1.0),
        };

        for (i, &drive) in drives[..drive_count].iter().enumerate() {
            let value = match count {
                1 => values[0] * mix,
                _ if i < count => values[i],
                _ => continue,
            };
            self.set_drive(mv, usize::from(drive), value * self.distance_scale);
        }
        Ok(())
    }

    fn set_drive(&mut self, mv: &mut PendingMove, drive: usize, value: f32) {
        if self.modal.drives_relative {
            mv.set_extrusion(drive, value);
        } else {
            let last = self.slot.extruder_position(drive);
            mv.set_extrusion(drive, value - last);
            self.slot.set_extruder_position(drive, value);
        }
    }

    /// `G92`: redefine the current position without moving
    ///
    /// Named axes count as homed afterwards.
    pub(super) fn set_positions(&mut self, io: &mut Io<'_>, line: &mut LineBuffer) -> Result<Outcome, CommandError> {
        if !self.slot.drained(io.motion) {
            return Ok(Outcome::Pending);
        }

        let mut any_axis = false;
        for axis in Axis::ALL {
            if line.seen(axis.letter()) {
                let value = line.get_float()? * self.distance_scale;
                self.slot.set_axis_position(axis, value);
                self.slot.set_homed(axis, true);
                any_axis = true;
            }
        }
        if line.seen(b'E') {
            let value = line.get_float()? * self.distance_scale;
            for drive in 0..EXTRUDERS {
                self.slot.set_extruder_position(drive, value);
            }
        }
        if any_axis {
            io.motion.set_position(&self.slot.axes());
        }
        Ok(Outcome::Done)
    }
}

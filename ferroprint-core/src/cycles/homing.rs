//! Homing (`G28`)
//!
//! Axes are homed one at a time in X, Y, Z order. For each axis a single
//! long endstop-checked move is issued toward the endstop; once the
//! planner has drained, the axis position is set to its home coordinate.

use super::CycleContext;
use crate::engine::Outcome;
use crate::motion::{Axis, MoveSlot, PendingMove, AXES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum HomingPhase {
    /// Stage the move toward the endstop
    Issue(Axis),
    /// Wait for the move to finish, then set the home position
    Wait(Axis),
}

/// Homing cycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Homing {
    requested: [bool; AXES],
    phase: HomingPhase,
}

impl Homing {
    /// Start homing the requested axes (all of them if none is requested)
    ///
    /// Clears the homed flag of each requested axis. Other axes keep
    /// theirs.
    pub fn start(mut requested: [bool; AXES], slot: &mut MoveSlot) -> Self {
        if !requested.iter().any(|&r| r) {
            requested = [true; AXES];
        }
        for axis in Axis::ALL {
            if requested[axis.index()] {
                slot.set_homed(axis, false);
            }
        }
        let first = Self::next_axis(&requested, 0).unwrap_or(Axis::X);
        Self {
            requested,
            phase: HomingPhase::Issue(first),
        }
    }

    /// Axes this cycle homes
    pub fn requested(&self) -> [bool; AXES] {
        self.requested
    }

    fn next_axis(requested: &[bool; AXES], from: usize) -> Option<Axis> {
        (from..AXES)
            .find(|&i| requested[i])
            .and_then(Axis::from_index)
    }

    pub(crate) fn step(&mut self, cx: &mut CycleContext<'_>) -> Outcome {
        match self.phase {
            HomingPhase::Issue(axis) => {
                if !cx.slot.is_free() {
                    return Outcome::Pending;
                }
                let config = cx.config.axis(axis);
                let mut mv = PendingMove::from_position(cx.slot.position(), config.home_feedrate);
                mv.set_axis(axis, config.homing_target(cx.slot.axis_position(axis)));
                mv.check_endstops = true;
                cx.slot.stage(mv);
                debug!("homing {}", axis);
                self.phase = HomingPhase::Wait(axis);
                Outcome::Pending
            }
            HomingPhase::Wait(axis) => {
                if !cx.slot.drained(cx.motion) {
                    return Outcome::Pending;
                }
                let mut position = cx.motion.current_position();
                position[axis.index()] = cx.config.axis(axis).home_position();
                cx.motion.set_position(&position);
                cx.slot.sync_axes(&position);
                cx.slot.set_homed(axis, true);

                match Self::next_axis(&self.requested, axis.index() + 1) {
                    Some(next) => {
                        self.phase = HomingPhase::Issue(next);
                        Outcome::Pending
                    }
                    None => Outcome::Done,
                }
            }
        }
    }
}

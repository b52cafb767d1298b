//! Motion collaborator trait
//!
//! The planner side of the move handoff. Trajectory planning and step
//! generation live behind this trait.

use crate::bed::BedTransform;
use crate::motion::{PendingMove, AXES};

/// Result of offering a move to the planner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Submit {
    /// The planner took the move
    Accepted,
    /// The planner queue is full; offer again later
    Busy,
}

impl Submit {
    /// Check if the move was taken
    pub fn is_accepted(self) -> bool {
        self == Submit::Accepted
    }
}

/// Trait for the motion planner
///
/// All methods must return immediately. Anything that takes time is
/// observed by polling [`Motion::queue_drained`].
pub trait Motion {
    /// Offer a move for execution
    fn submit(&mut self, mv: &PendingMove) -> Submit;

    /// Check if every accepted move has finished
    fn queue_drained(&self) -> bool;

    /// Live machine position of each axis
    fn current_position(&self) -> [f32; AXES];

    /// Redefine the machine position without moving
    ///
    /// Only called while the queue is drained.
    fn set_position(&mut self, position: &[f32; AXES]);

    /// Check if the last endstop-checked move stopped on a trigger
    ///
    /// Covers both axis endstops and the Z probe.
    fn endstop_triggered(&self) -> bool;

    /// Turn off all motor drivers
    fn disable_drives(&mut self);

    /// Install or remove the bed-levelling correction
    fn set_bed_transform(&mut self, transform: Option<BedTransform>);
}

//! Single pending-move slot and position mirror

use super::axis::{Axis, AXES, DRIVES};
use crate::traits::Motion;

/// One move waiting to be taken by the motion collaborator
///
/// Axis entries are absolute machine coordinates. Extruder entries are
/// the amount to extrude during this move, since extruders have no
/// meaningful absolute position at the planner.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PendingMove {
    /// Target per drive (axes first, then extruders)
    pub coords: [f32; DRIVES],
    /// Feedrate in mm/s
    pub feedrate: f32,
    /// Stop on endstop / probe trigger
    pub check_endstops: bool,
    /// Drives that take part in this move
    pub active: [bool; DRIVES],
}

impl PendingMove {
    /// A move that stays at `position` with no extrusion
    pub fn from_position(position: &[f32; DRIVES], feedrate: f32) -> Self {
        let mut coords = [0.0; DRIVES];
        coords[..AXES].copy_from_slice(&position[..AXES]);
        Self {
            coords,
            feedrate,
            check_endstops: false,
            active: [false; DRIVES],
        }
    }

    /// Target of an axis
    pub fn axis(&self, axis: Axis) -> f32 {
        self.coords[axis.index()]
    }

    /// Set the target of an axis and mark it active
    pub fn set_axis(&mut self, axis: Axis, target: f32) {
        self.coords[axis.index()] = target;
        self.active[axis.index()] = true;
    }

    /// Set the extrusion amount of an extruder drive and mark it active
    pub fn set_extrusion(&mut self, extruder: usize, amount: f32) {
        self.coords[AXES + extruder] = amount;
        self.active[AXES + extruder] = true;
    }

    /// Extrusion amount of an extruder drive
    pub fn extrusion(&self, extruder: usize) -> f32 {
        self.coords[AXES + extruder]
    }
}

/// The engine's half of the move handoff
///
/// Holds at most one [`PendingMove`]. Staging into an occupied slot is
/// refused, which is what holds back the next move command until the
/// motion collaborator has taken the previous one.
#[derive(Debug, Clone)]
pub struct MoveSlot {
    pending: Option<PendingMove>,
    /// Axes: machine position after the last staged move.
    /// Extruders: last absolute `E` value, for absolute extrusion.
    position: [f32; DRIVES],
    homed: [bool; AXES],
}

impl Default for MoveSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl MoveSlot {
    /// Create an empty slot at the origin with no axis homed
    pub const fn new() -> Self {
        Self {
            pending: None,
            position: [0.0; DRIVES],
            homed: [false; AXES],
        }
    }

    /// Check if a new move can be staged
    pub fn is_free(&self) -> bool {
        self.pending.is_none()
    }

    /// Stage a move and advance the mirror to its axis targets
    ///
    /// Returns false (and changes nothing) if a move is already pending.
    pub fn stage(&mut self, mv: PendingMove) -> bool {
        if self.pending.is_some() {
            return false;
        }
        for axis in Axis::ALL {
            if mv.active[axis.index()] {
                self.position[axis.index()] = mv.coords[axis.index()];
            }
        }
        self.pending = Some(mv);
        true
    }

    /// The staged move, if any
    pub fn peek(&self) -> Option<&PendingMove> {
        self.pending.as_ref()
    }

    /// Take ownership of the staged move
    pub fn take(&mut self) -> Option<PendingMove> {
        self.pending.take()
    }

    /// Offer the staged move to the motion collaborator
    pub fn offer(&mut self, motion: &mut dyn Motion) {
        if let Some(mv) = self.pending.as_ref() {
            if motion.submit(mv).is_accepted() {
                self.pending = None;
            }
        }
    }

    /// Check that nothing is staged and the motion queue has run dry
    pub fn drained(&self, motion: &dyn Motion) -> bool {
        self.pending.is_none() && motion.queue_drained()
    }

    /// Mirrored position of every drive
    pub fn position(&self) -> &[f32; DRIVES] {
        &self.position
    }

    /// Mirrored position of one axis
    pub fn axis_position(&self, axis: Axis) -> f32 {
        self.position[axis.index()]
    }

    /// Mirrored axis positions only
    pub fn axes(&self) -> [f32; AXES] {
        let mut axes = [0.0; AXES];
        axes.copy_from_slice(&self.position[..AXES]);
        axes
    }

    /// Overwrite the mirrored position of one axis
    pub fn set_axis_position(&mut self, axis: Axis, value: f32) {
        self.position[axis.index()] = value;
    }

    /// Last absolute extruder position
    pub fn extruder_position(&self, extruder: usize) -> f32 {
        self.position[AXES + extruder]
    }

    /// Overwrite the last absolute extruder position
    pub fn set_extruder_position(&mut self, extruder: usize, value: f32) {
        self.position[AXES + extruder] = value;
    }

    /// Replace the mirrored axes with the collaborator's live position
    ///
    /// Used after moves that may stop short (endstops, probe).
    pub fn sync_axes(&mut self, axes: &[f32; AXES]) {
        self.position[..AXES].copy_from_slice(axes);
    }

    /// Check if an axis has been homed
    pub fn is_homed(&self, axis: Axis) -> bool {
        self.homed[axis.index()]
    }

    /// Record homed status of one axis
    pub fn set_homed(&mut self, axis: Axis, homed: bool) {
        self.homed[axis.index()] = homed;
    }

    /// Forget all homing
    pub fn clear_homed(&mut self) {
        self.homed = [false; AXES];
    }

    /// Drop any staged move without handing it over
    pub fn discard(&mut self) -> Option<PendingMove> {
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockMotion;

    fn move_x(x: f32) -> PendingMove {
        let mut mv = PendingMove::from_position(&[0.0; DRIVES], 10.0);
        mv.set_axis(Axis::X, x);
        mv
    }

    #[test]
    fn test_stage_updates_mirror() {
        let mut slot = MoveSlot::new();
        assert!(slot.stage(move_x(12.0)));
        assert_eq!(slot.axis_position(Axis::X), 12.0);
        assert!(!slot.is_free());
    }

    #[test]
    fn test_second_stage_refused() {
        let mut slot = MoveSlot::new();
        assert!(slot.stage(move_x(1.0)));
        assert!(!slot.stage(move_x(2.0)));
        assert_eq!(slot.axis_position(Axis::X), 1.0);
        assert_eq!(slot.take().map(|m| m.axis(Axis::X)), Some(1.0));
        assert!(slot.stage(move_x(2.0)));
    }

    #[test]
    fn test_offer_respects_busy() {
        let mut slot = MoveSlot::new();
        let mut motion = MockMotion::new();
        motion.busy = true;

        slot.stage(move_x(5.0));
        slot.offer(&mut motion);
        assert!(!slot.is_free());
        assert!(motion.submitted.is_empty());

        motion.busy = false;
        slot.offer(&mut motion);
        assert!(slot.is_free());
        assert_eq!(motion.submitted.len(), 1);
    }

    #[test]
    fn test_drained_requires_empty_slot() {
        let mut slot = MoveSlot::new();
        let motion = MockMotion::new();
        assert!(slot.drained(&motion));
        slot.stage(move_x(1.0));
        assert!(!slot.drained(&motion));
    }

    #[test]
    fn test_homed_flags_independent() {
        let mut slot = MoveSlot::new();
        slot.set_homed(Axis::Y, true);
        assert!(!slot.is_homed(Axis::X));
        assert!(slot.is_homed(Axis::Y));
        slot.clear_homed();
        assert!(!slot.is_homed(Axis::Y));
    }
}

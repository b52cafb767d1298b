//! Move descriptors and the engine-side position mirror
//!
//! The engine never talks to steppers. It stages at most one
//! [`PendingMove`] at a time and keeps a mirror of where the machine will
//! be once that move has run.

pub mod axis;
pub mod slot;

pub use axis::{Axis, AXES, DRIVES, EXTRUDERS};
pub use slot::{MoveSlot, PendingMove};

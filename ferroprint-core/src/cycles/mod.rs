//! Canned cycles
//!
//! Commands that take longer than one tick are state machines. The engine
//! calls [`Cycle::step`] once per tick; each call makes at most one
//! transition and reports [`Outcome::Pending`] until the cycle is done.
//! While a cycle runs no other command is dispatched.

pub mod dwell;
pub mod heat;
pub mod homing;
pub mod probing;
pub mod tool_change;

pub use dwell::Dwell;
pub use heat::HeaterWait;
pub use homing::Homing;
pub use probing::{ProbeMode, Probing};
pub use tool_change::ToolChange;

use crate::bed::ProbeTable;
use crate::config::MachineConfig;
use crate::engine::Outcome;
use crate::motion::MoveSlot;
use crate::tool::ToolTable;
use crate::traits::{Motion, Thermal};

/// Engine state a cycle may touch during one step
pub struct CycleContext<'a> {
    pub slot: &'a mut MoveSlot,
    pub motion: &'a mut dyn Motion,
    pub thermal: &'a mut dyn Thermal,
    pub tools: &'a mut ToolTable,
    pub probes: &'a mut ProbeTable,
    pub config: &'a MachineConfig,
    /// Milliseconds since the previous tick
    pub elapsed_ms: u32,
}

/// A running canned cycle
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Cycle {
    Homing(Homing),
    Probing(Probing),
    ToolChange(ToolChange),
    Dwell(Dwell),
    HeaterWait(HeaterWait),
}

impl Cycle {
    /// Advance by one transition
    pub fn step(&mut self, cx: &mut CycleContext<'_>) -> Outcome {
        match self {
            Cycle::Homing(c) => c.step(cx),
            Cycle::Probing(c) => c.step(cx),
            Cycle::ToolChange(c) => c.step(cx),
            Cycle::Dwell(c) => c.step(cx),
            Cycle::HeaterWait(c) => c.step(cx),
        }
    }

    /// Name used in log lines
    pub fn name(&self) -> &'static str {
        match self {
            Cycle::Homing(_) => "homing",
            Cycle::Probing(_) => "probing",
            Cycle::ToolChange(_) => "tool change",
            Cycle::Dwell(_) => "dwell",
            Cycle::HeaterWait(_) => "heater wait",
        }
    }
}

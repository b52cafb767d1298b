//! Tools: extruder drives, heaters and offsets
//!
//! A tool is created by `M563` and lasts for the session. Selecting a
//! tool makes its heaters active and its offsets apply to later moves.
//! A tool whose heater has faulted cannot be selected until the fault is
//! cleared.

use core::fmt::{self, Write};

use heapless::Vec;

use crate::error::CommandError;
use crate::motion::{AXES, EXTRUDERS};
use crate::traits::{HeaterId, Thermal, ABS_ZERO, MAX_HEATERS};

/// Maximum number of defined tools
pub const MAX_TOOLS: usize = 8;

/// A tool definition plus its runtime state
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Tool {
    number: i32,
    drives: Vec<u8, EXTRUDERS>,
    heaters: Vec<HeaterId, MAX_HEATERS>,
    /// Offset subtracted from absolute X, Y, Z targets while selected
    pub offsets: [f32; AXES],
    /// Active temperature per heater, same order as `heaters`
    active_temps: [f32; MAX_HEATERS],
    /// Standby temperature per heater, same order as `heaters`
    standby_temps: [f32; MAX_HEATERS],
    selected: bool,
    heater_fault: bool,
}

impl Tool {
    /// Define a tool
    ///
    /// # Arguments
    /// * `number` - Tool number used by `T<n>`
    /// * `drives` - Extruder drive indices
    /// * `heaters` - Heaters the tool uses
    pub fn new(number: i32, drives: &[u8], heaters: &[HeaterId]) -> Result<Self, CommandError> {
        if number < 0
            || drives.iter().any(|&d| d as usize >= EXTRUDERS)
            || heaters.iter().any(|h| h.index() >= MAX_HEATERS)
        {
            return Err(CommandError::InvalidTool);
        }
        Ok(Self {
            number,
            drives: Vec::from_slice(drives).map_err(|_| CommandError::InvalidTool)?,
            heaters: Vec::from_slice(heaters).map_err(|_| CommandError::InvalidTool)?,
            offsets: [0.0; AXES],
            active_temps: [ABS_ZERO; MAX_HEATERS],
            standby_temps: [ABS_ZERO; MAX_HEATERS],
            selected: false,
            heater_fault: false,
        })
    }

    /// Tool number
    pub fn number(&self) -> i32 {
        self.number
    }

    /// Extruder drives
    pub fn drives(&self) -> &[u8] {
        &self.drives
    }

    /// Heaters
    pub fn heaters(&self) -> &[HeaterId] {
        &self.heaters
    }

    /// Share of a single `E` value given to each drive
    pub fn mix(&self) -> f32 {
        if self.drives.is_empty() {
            0.0
        } else {
            1.0 / self.drives.len() as f32
        }
    }

    /// Check if this is the selected tool
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Check if one of the tool's heaters has faulted
    pub fn has_heater_fault(&self) -> bool {
        self.heater_fault
    }

    /// Check if the tool uses a heater
    pub fn uses_heater(&self, heater: HeaterId) -> bool {
        self.heaters.contains(&heater)
    }

    /// Active temperatures, one per heater
    pub fn active_temperatures(&self) -> &[f32] {
        &self.active_temps[..self.heaters.len()]
    }

    /// Standby temperatures, one per heater
    pub fn standby_temperatures(&self) -> &[f32] {
        &self.standby_temps[..self.heaters.len()]
    }

    /// Set active temperatures
    ///
    /// A single value applies to every heater; otherwise values are taken
    /// in heater order and missing entries are left unchanged.
    pub fn set_active_temperatures(&mut self, temps: &[f32]) {
        spread(&mut self.active_temps[..self.heaters.len()], temps);
    }

    /// Set standby temperatures, same rules as the active ones
    pub fn set_standby_temperatures(&mut self, temps: &[f32]) {
        spread(&mut self.standby_temps[..self.heaters.len()], temps);
    }

    /// Push both temperature sets to the heater collaborator
    pub fn apply_temperatures(&self, thermal: &mut dyn Thermal) {
        for (i, &heater) in self.heaters.iter().enumerate() {
            thermal.set_target(heater, self.active_temps[i]);
            thermal.set_standby_target(heater, self.standby_temps[i]);
        }
    }

    /// Bring the tool's heaters to their active temperatures
    pub fn activate(&mut self, thermal: &mut dyn Thermal) {
        self.apply_temperatures(thermal);
        for &heater in &self.heaters {
            thermal.set_active(heater);
        }
    }

    /// Drop the tool's heaters to their standby temperatures
    pub fn standby(&mut self, thermal: &mut dyn Thermal) {
        self.apply_temperatures(thermal);
        for &heater in &self.heaters {
            thermal.set_standby(heater);
        }
    }

    /// Check if every heater has reached its current target
    pub fn at_temperature(&self, thermal: &dyn Thermal) -> bool {
        self.heaters.iter().all(|&h| thermal.at_target(h))
    }

    /// Write a one-line description of the tool
    ///
    /// `Tool 0 - drives: 0 heaters (active/standby temps): 1 (200.0/150.0) status: selected`
    pub fn report<W: Write>(&self, out: &mut W) -> fmt::Result {
        write!(out, "Tool {} - drives:", self.number)?;
        for d in &self.drives {
            write!(out, " {}", d)?;
        }
        write!(out, " heaters (active/standby temps):")?;
        for (i, h) in self.heaters.iter().enumerate() {
            write!(
                out,
                " {} ({:.1}/{:.1})",
                h.0, self.active_temps[i], self.standby_temps[i]
            )?;
        }
        write!(
            out,
            " offsets: X{:.2} Y{:.2} Z{:.2}",
            self.offsets[0], self.offsets[1], self.offsets[2]
        )?;
        let status = if self.heater_fault {
            "fault"
        } else if self.selected {
            "selected"
        } else {
            "standby"
        };
        write!(out, " status: {}", status)
    }
}

fn spread(dest: &mut [f32], values: &[f32]) {
    match values {
        [] => {}
        [single] => dest.iter_mut().for_each(|t| *t = *single),
        many => dest.iter_mut().zip(many).for_each(|(t, v)| *t = *v),
    }
}

/// Defined tools and the current selection
#[derive(Debug, Clone, Default)]
pub struct ToolTable {
    tools: Vec<Tool, MAX_TOOLS>,
    current: Option<usize>,
}

impl ToolTable {
    /// Create an empty table
    pub const fn new() -> Self {
        Self {
            tools: Vec::new(),
            current: None,
        }
    }

    /// Add a tool, replacing any existing tool with the same number
    ///
    /// Redefining the selected tool deselects it.
    pub fn define(&mut self, tool: Tool) -> Result<(), CommandError> {
        if let Some(i) = self.position(tool.number) {
            if self.current == Some(i) {
                self.current = None;
            }
            self.tools[i] = tool;
            return Ok(());
        }
        self.tools.push(tool).map_err(|_| CommandError::ToolTableFull)
    }

    fn position(&self, number: i32) -> Option<usize> {
        self.tools.iter().position(|t| t.number == number)
    }

    /// Tool by number
    pub fn get(&self, number: i32) -> Option<&Tool> {
        self.tools.iter().find(|t| t.number == number)
    }

    /// Mutable tool by number
    pub fn get_mut(&mut self, number: i32) -> Option<&mut Tool> {
        self.tools.iter_mut().find(|t| t.number == number)
    }

    /// Selected tool
    pub fn current(&self) -> Option<&Tool> {
        self.current.and_then(|i| self.tools.get(i))
    }

    /// Mutable selected tool
    pub fn current_mut(&mut self) -> Option<&mut Tool> {
        self.current.and_then(|i| self.tools.get_mut(i))
    }

    /// Number of the selected tool
    pub fn current_number(&self) -> Option<i32> {
        self.current().map(|t| t.number)
    }

    /// Make a tool the current one
    ///
    /// Heater handling is the caller's job; this only moves the selection.
    pub fn select(&mut self, number: i32) -> Result<(), CommandError> {
        let i = self.position(number).ok_or(CommandError::UnknownTool(number))?;
        if self.tools[i].heater_fault {
            return Err(CommandError::HeaterFault);
        }
        if let Some(old) = self.current_mut() {
            old.selected = false;
        }
        self.tools[i].selected = true;
        self.current = Some(i);
        Ok(())
    }

    /// Clear the selection
    pub fn deselect(&mut self) {
        if let Some(old) = self.current_mut() {
            old.selected = false;
        }
        self.current = None;
    }

    /// Offsets of the selected tool, zero with none
    pub fn current_offsets(&self) -> [f32; AXES] {
        self.current().map_or([0.0; AXES], |t| t.offsets)
    }

    /// Mark every tool using a heater as faulty
    ///
    /// A faulty selected tool stays selected so its moves still resolve,
    /// but cannot be selected again until cleared.
    pub fn flag_heater_fault(&mut self, heater: HeaterId) {
        for tool in self.tools.iter_mut().filter(|t| t.uses_heater(heater)) {
            tool.heater_fault = true;
        }
    }

    /// Clear the fault flag of every tool using a heater
    pub fn clear_heater_fault(&mut self, heater: HeaterId) {
        for tool in self.tools.iter_mut().filter(|t| t.uses_heater(heater)) {
            tool.heater_fault = false;
        }
    }

    /// All defined tools
    pub fn iter(&self) -> impl Iterator<Item = &Tool> {
        self.tools.iter()
    }
}

//! Command dispatch

use heapless::String;

use super::{Engine, Io, Outcome};
use crate::bed::MAX_PROBE_POINTS;
use crate::config::LimitPolicy;
use crate::cycles::{probing, Cycle, Dwell, HeaterWait, Homing, ProbeMode, Probing, ToolChange};
use crate::error::CommandError;
use crate::gcode::{Command, LineBuffer};
use crate::motion::{Axis, AXES, EXTRUDERS};
use crate::stream::Origin;
use crate::tool::Tool;
use crate::traits::{HeaterId, BED_HEATER, MAX_HEATERS};

impl Engine {
    /// Route a line to its handler
    pub(super) fn dispatch(&mut self, io: &mut Io<'_>, origin: Origin, line: &mut LineBuffer) -> Outcome {
        let command = line.command();

        if let Some(capture) = self.streams.get(origin).capture {
            let is_end = matches!(command, Ok(Command { letter: b'M', code: 29 }));
            if !is_end {
                return self.capture_line(io, capture, line).into();
            }
        }

        let command = match command {
            Ok(c) => c,
            Err(e) => return Outcome::Error(e.into()),
        };
        let result = match command.letter {
            b'G' => self.handle_g(io, origin, line, command.code),
            b'M' => self.handle_m(io, origin, line, command.code),
            b'T' => self.select_tool(origin, command.code),
            letter => Err(CommandError::UnknownCode {
                letter,
                code: command.code,
            }),
        };
        result.into()
    }

    fn handle_g(
        &mut self,
        io: &mut Io<'_>,
        origin: Origin,
        line: &mut LineBuffer,
        code: i32,
    ) -> Result<Outcome, CommandError> {
        match code {
            0 | 1 => self.setup_move(line),
            4 => {
                let ms = if line.seen(b'P') {
                    line.get_long()?
                } else if line.seen(b'S') {
                    (line.get_float()? * 1000.0) as i64
                } else {
                    0
                };
                Ok(self.start_cycle(Cycle::Dwell(Dwell::new(ms)), origin))
            }
            10 => self.set_or_report_offsets(io, line),
            20 => {
                self.distance_scale = 25.4;
                Ok(Outcome::Done)
            }
            21 => {
                self.distance_scale = 1.0;
                Ok(Outcome::Done)
            }
            28 => {
                let mut requested = [false; AXES];
                for axis in Axis::ALL {
                    requested[axis.index()] = line.seen(axis.letter());
                }
                let homing = Homing::start(requested, &mut self.slot);
                Ok(self.start_cycle(Cycle::Homing(homing), origin))
            }
            30 => self.probe_point(io, origin, line),
            31 => {
                if line.seen(b'Z') {
                    self.config.probe.trigger_height = line.get_float()? * self.distance_scale;
                } else {
                    let height = self.config.probe.trigger_height;
                    self.reply_fmt(format_args!("Z probe trigger height: {:.2}", height))?;
                }
                Ok(Outcome::Done)
            }
            32 => {
                let cycle = Probing::new(ProbeMode::Bed {
                    count: self.probe_count,
                })?;
                Ok(self.start_cycle(Cycle::Probing(cycle), origin))
            }
            90 => {
                self.modal.axes_relative = false;
                Ok(Outcome::Done)
            }
            91 => {
                self.modal.axes_relative = true;
                Ok(Outcome::Done)
            }
            92 => self.set_positions(io, line),
            _ => Err(CommandError::UnknownCode { letter: b'G', code }),
        }
    }

    fn handle_m(
        &mut self,
        io: &mut Io<'_>,
        origin: Origin,
        line: &mut LineBuffer,
        code: i32,
    ) -> Result<Outcome, CommandError> {
        match code {
            0 | 1 => {
                self.cancel(io);
                Ok(Outcome::Done)
            }
            18 | 84 => {
                if !self.slot.drained(io.motion) {
                    return Ok(Outcome::Pending);
                }
                io.motion.disable_drives();
                self.slot.clear_homed();
                Ok(Outcome::Done)
            }
            23 => {
                let name = line.get_unprecedented_string()?;
                self.queue_file_to_print(io, name)?;
                self.reply_fmt(format_args!("File {} selected", name))?;
                Ok(Outcome::Done)
            }
            24 => {
                self.start_print()?;
                Ok(Outcome::Done)
            }
            25 => {
                self.pause_print();
                Ok(Outcome::Done)
            }
            28 => {
                let name = line.get_unprecedented_string()?;
                self.begin_capture(io, origin, name)
            }
            29 => self.end_capture(io, origin),
            30 => {
                let name = line.get_unprecedented_string()?;
                self.delete_file(io, name)?;
                Ok(Outcome::Done)
            }
            32 => {
                let name = line.get_unprecedented_string()?;
                self.queue_file_to_print(io, name)?;
                self.start_print()?;
                Ok(Outcome::Done)
            }
            82 => {
                self.modal.drives_relative = false;
                Ok(Outcome::Done)
            }
            83 => {
                self.modal.drives_relative = true;
                Ok(Outcome::Done)
            }
            98 => {
                if !line.seen(b'P') {
                    return Err(CommandError::MissingParameter(b'P'));
                }
                let name = line.get_string()?;
                self.do_file_macro(io, name, Some(origin))?;
                Ok(Outcome::Done)
            }
            99 => {
                if self.macros.is_empty() {
                    return Err(CommandError::NotInMacro);
                }
                self.return_from_macro(io);
                Ok(Outcome::Done)
            }
            104 | 109 => self.set_tool_temperature(io, origin, line, code == 109),
            105 => {
                let mut text: String<64> = String::new();
                self.write_temperatures(io, &mut text)
                    .map_err(|_| CommandError::ReplyOverflow)?;
                self.reply_fmt(format_args!("{}", text))?;
                Ok(Outcome::Done)
            }
            114 => {
                let mut text: String<96> = String::new();
                self.current_coordinates(&mut text)
                    .map_err(|_| CommandError::ReplyOverflow)?;
                self.reply_fmt(format_args!("{}", text))?;
                Ok(Outcome::Done)
            }
            120 => {
                self.modal_stack
                    .push(self.modal)
                    .map_err(|_| CommandError::ModalStackOverflow)?;
                Ok(Outcome::Done)
            }
            121 => {
                self.modal = self
                    .modal_stack
                    .pop()
                    .map_err(|_| CommandError::ModalStackUnderflow)?;
                Ok(Outcome::Done)
            }
            140 | 190 => {
                if line.seen(b'S') {
                    let temperature = line.get_float()?;
                    io.thermal.set_target(BED_HEATER, temperature);
                    io.thermal.set_active(BED_HEATER);
                }
                if code == 190 {
                    let wait = HeaterWait::new(&[BED_HEATER]);
                    return Ok(self.start_cycle(Cycle::HeaterWait(wait), origin));
                }
                Ok(Outcome::Done)
            }
            208 => {
                let set_min = line.seen(b'S') && line.get_int()? == 1;
                for axis in Axis::ALL {
                    if line.seen(axis.letter()) {
                        let value = line.get_float()? * self.distance_scale;
                        let range = self.config.axis_mut(axis);
                        if set_min {
                            range.min = value;
                        } else {
                            range.max = value;
                        }
                    }
                }
                Ok(Outcome::Done)
            }
            563 => self.define_tool(line),
            564 => {
                if line.seen(b'S') {
                    self.config.limit_policy = match line.get_int()? {
                        0 => LimitPolicy::Ignore,
                        2 => LimitPolicy::Reject,
                        _ => LimitPolicy::Clamp,
                    };
                }
                Ok(Outcome::Done)
            }
            _ => Err(CommandError::UnknownCode { letter: b'M', code }),
        }
    }

    /// `T<n>`: change tool, `T-1` deselects
    fn select_tool(&mut self, origin: Origin, number: i32) -> Result<Outcome, CommandError> {
        let current = self.tools.current_number();
        let target = (number >= 0).then_some(number);
        if target == current {
            return Ok(Outcome::Done);
        }
        if let Some(n) = target {
            let tool = self.tools.get(n).ok_or(CommandError::UnknownTool(n))?;
            if tool.has_heater_fault() {
                return Err(CommandError::HeaterFault);
            }
        }
        let change = ToolChange::new(current, target);
        Ok(self.start_cycle(Cycle::ToolChange(change), origin))
    }

    /// `M563 P<n> D<d:d> H<h:h>`
    fn define_tool(&mut self, line: &mut LineBuffer) -> Result<Outcome, CommandError> {
        if !line.seen(b'P') {
            return Err(CommandError::MissingParameter(b'P'));
        }
        let number = line.get_int()?;

        let mut drive_values = [0i64; EXTRUDERS];
        let drive_count = if line.seen(b'D') {
            line.get_long_array(&mut drive_values)?
        } else {
            0
        };
        let mut heater_values = [0i64; MAX_HEATERS];
        let heater_count = if line.seen(b'H') {
            line.get_long_array(&mut heater_values)?
        } else {
            0
        };

        let mut drives = [0u8; EXTRUDERS];
        for (d, &v) in drives.iter_mut().zip(&drive_values[..drive_count]) {
            *d = u8::try_from(v).map_err(|_| CommandError::InvalidTool)?;
        }
        let mut heaters = [HeaterId(0); MAX_HEATERS];
        for (h, &v) in heaters.iter_mut().zip(&heater_values[..heater_count]) {
            *h = HeaterId(u8::try_from(v).map_err(|_| CommandError::InvalidTool)?);
        }

        let tool = Tool::new(number, &drives[..drive_count], &heaters[..heater_count])?;
        self.tools.define(tool)?;
        info!("tool {} defined", number);
        Ok(Outcome::Done)
    }

    /// `G10 P<n> [X Y Z] [R<standby>] [S<active>]`
    ///
    /// With only `P`, reports the tool.
    fn set_or_report_offsets(&mut self, io: &mut Io<'_>, line: &mut LineBuffer) -> Result<Outcome, CommandError> {
        if !line.seen(b'P') {
            return Err(CommandError::MissingParameter(b'P'));
        }
        let number = line.get_int()?;
        let scale = self.distance_scale;

        // Parse every field before touching the tool
        let mut offsets: [Option<f32>; AXES] = [None; AXES];
        for axis in Axis::ALL {
            if line.seen(axis.letter()) {
                offsets[axis.index()] = Some(line.get_float()? * scale);
            }
        }
        let mut standby = [0.0f32; MAX_HEATERS];
        let standby_count = if line.seen(b'R') {
            Some(line.get_float_array(&mut standby)?)
        } else {
            None
        };
        let mut active = [0.0f32; MAX_HEATERS];
        let active_count = if line.seen(b'S') {
            Some(line.get_float_array(&mut active)?)
        } else {
            None
        };

        let tool = self
            .tools
            .get_mut(number)
            .ok_or(CommandError::UnknownTool(number))?;

        let mut changed = false;
        for (slot, value) in tool.offsets.iter_mut().zip(offsets) {
            if let Some(value) = value {
                *slot = value;
                changed = true;
            }
        }
        if let Some(n) = standby_count {
            tool.set_standby_temperatures(&standby[..n]);
        }
        if let Some(n) = active_count {
            tool.set_active_temperatures(&active[..n]);
        }
        let temps_changed = standby_count.is_some() || active_count.is_some();
        if temps_changed && tool.is_selected() {
            tool.apply_temperatures(io.thermal);
        }

        if !changed && !temps_changed {
            let mut text: String<160> = String::new();
            tool.report(&mut text)
                .map_err(|_| CommandError::ReplyOverflow)?;
            self.reply_fmt(format_args!("{}", text))?;
        }
        Ok(Outcome::Done)
    }

    /// `M104` / `M109 S<temp> [T<n>]`
    fn set_tool_temperature(
        &mut self,
        io: &mut Io<'_>,
        origin: Origin,
        line: &mut LineBuffer,
        wait: bool,
    ) -> Result<Outcome, CommandError> {
        let number = if line.seen(b'T') {
            line.get_int()?
        } else {
            self.tools
                .current_number()
                .ok_or(CommandError::UnknownTool(-1))?
        };
        let tool = self
            .tools
            .get_mut(number)
            .ok_or(CommandError::UnknownTool(number))?;

        if line.seen(b'S') {
            let temperature = line.get_float()?;
            tool.set_active_temperatures(&[temperature]);
            tool.apply_temperatures(io.thermal);
        }
        if wait {
            let heaters = HeaterWait::new(tool.heaters());
            return Ok(self.start_cycle(Cycle::HeaterWait(heaters), origin));
        }
        Ok(Outcome::Done)
    }

    /// `G30`
    ///
    /// Without `P`, probes here and sets Z. With `P<n>`, sets probe point
    /// `n` from `X`/`Y`, records `Z` if given or probes it otherwise, and
    /// with `S` fits the bed plane through points `0..=n`.
    fn probe_point(&mut self, io: &mut Io<'_>, origin: Origin, line: &mut LineBuffer) -> Result<Outcome, CommandError> {
        if !line.seen(b'P') {
            let cycle = Probing::new(ProbeMode::Here)?;
            return Ok(self.start_cycle(Cycle::Probing(cycle), origin));
        }

        let index = usize::try_from(line.get_int()?).map_err(|_| CommandError::InvalidProbePoint)?;
        let current = self
            .probes
            .get(index)
            .copied()
            .ok_or(CommandError::InvalidProbePoint)?;

        let x = if line.seen(b'X') {
            line.get_float()? * self.distance_scale
        } else {
            current.x
        };
        let y = if line.seen(b'Y') {
            line.get_float()? * self.distance_scale
        } else {
            current.y
        };
        self.probes.set_location(index, x, y);
        if index >= self.probe_count && index < MAX_PROBE_POINTS {
            self.probe_count = index + 1;
        }
        let commit = line.seen(b'S');

        if line.seen(b'Z') {
            let z = line.get_float()? * self.distance_scale;
            self.probes.record(index, z);
            if commit {
                return Ok(probing::commit_plane(&self.probes, index + 1, io.motion));
            }
            return Ok(Outcome::Done);
        }

        let cycle = Probing::new(ProbeMode::Point { index, commit })?;
        Ok(self.start_cycle(Cycle::Probing(cycle), origin))
    }
}

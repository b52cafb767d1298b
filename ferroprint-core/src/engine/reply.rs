//! Reply routing
//!
//! Host links get `ok`, `ok <text>` or `Error: <message>`. Lines from a
//! macro answer to the link that started the outermost macro; lines from
//! the print file have nobody to answer to and are only logged.

use core::fmt::{self, Write};

use heapless::String;

use super::{Engine, Io};
use crate::error::CommandError;
use crate::motion::{AXES, EXTRUDERS};
use crate::stream::Origin;
use crate::traits::{heater_for_extruder, BED_HEATER};

/// Capacity of the per-command reply text
pub const REPLY_CAPACITY: usize = 256;

fn send(io: &mut Io<'_>, target: Origin, text: &str) {
    if let Some(link) = io.link(target) {
        link.reply(text);
    }
}

impl Engine {
    /// Host link that hears about lines from `origin`
    fn reply_target(&self, origin: Origin) -> Option<Origin> {
        match origin {
            Origin::Macro => self.macros.root_caller().filter(|o| o.is_link()),
            Origin::File => None,
            link => Some(link),
        }
    }

    /// Report successful completion of a line from `origin`
    pub(super) fn acknowledge(&mut self, io: &mut Io<'_>, origin: Origin) {
        match origin {
            Origin::Network | Origin::Serial => {
                let mut out: String<{ REPLY_CAPACITY + 3 }> = String::new();
                let _ = out.push_str("ok");
                if !self.reply.is_empty() {
                    let _ = out.push(' ');
                    let _ = out.push_str(&self.reply);
                }
                send(io, origin, &out);
            }
            Origin::Macro => {
                if self.reply.is_empty() {
                    return;
                }
                if let Some(target) = self.reply_target(origin) {
                    send(io, target, &self.reply);
                }
            }
            Origin::File => {
                if !self.reply.is_empty() {
                    info!("print: {}", self.reply.as_str());
                }
            }
        }
    }

    /// Report a failed line from `origin`
    pub(super) fn report_error(&mut self, io: &mut Io<'_>, origin: Origin, e: CommandError) {
        match self.reply_target(origin) {
            Some(target) => {
                let mut out: String<64> = String::new();
                let _ = write!(out, "Error: {}", e.message());
                send(io, target, &out);
            }
            None => error!("{} line failed: {}", origin.name(), e.message()),
        }
    }

    /// Ask a host link to send line `line_number` again
    pub(super) fn request_resend(&mut self, io: &mut Io<'_>, origin: Origin, line_number: i32) {
        let mut out: String<16> = String::new();
        let _ = write!(out, "rs {}", line_number);
        send(io, origin, &out);
    }

    /// Append formatted text to the reply of the current command
    pub(super) fn reply_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<(), CommandError> {
        self.reply
            .write_fmt(args)
            .map_err(|_| CommandError::ReplyOverflow)
    }

    /// Write the current position in user coordinates
    ///
    /// `X:10.00 Y:10.00 Z:0.30 E0:1.20 E1:0.00`
    pub fn current_coordinates<W: Write>(&self, out: &mut W) -> fmt::Result {
        let offsets = self.tools.current_offsets();
        for (i, letter) in ['X', 'Y', 'Z'].into_iter().enumerate().take(AXES) {
            if i > 0 {
                out.write_char(' ')?;
            }
            write!(out, "{}:{:.2}", letter, self.slot.position()[i] + offsets[i])?;
        }
        for e in 0..EXTRUDERS {
            write!(out, " E{}:{:.2}", e, self.slot.extruder_position(e))?;
        }
        Ok(())
    }

    /// Write heater temperatures, `T0:205.3 T1:20.1 B:59.8`
    pub(super) fn write_temperatures<W: Write>(&self, io: &Io<'_>, out: &mut W) -> fmt::Result {
        for e in 0..EXTRUDERS as u8 {
            write!(out, "T{}:{:.1} ", e, io.thermal.temperature(heater_for_extruder(e)))?;
        }
        write!(out, "B:{:.1}", io.thermal.temperature(BED_HEATER))
    }
}

//! Line buffer and field parser for a single command
//!
//! Characters are fed one at a time with [`LineBuffer::put`]. Once a
//! terminator completes a line, fields are read with the `seen` / `get_*`
//! pair:
//!
//! ```text
//! N12 G1 X10.5 Y-3 E1:2:3 F3000 ; comment *57
//! └┬┘ └┬┘ └─┬─┘ └─┬┘ └──┬─┘ └─┬─┘ └───┬───┘ └┬┘
//!  │   │    │     │     │     │       │      └ checksum (XOR of preceding bytes)
//!  │   │    │     │     │     │       └ discarded
//!  │   │    └─────┴─────┴─────┴ letter / value fields
//!  │   └ command word
//!  └ optional line number
//! ```

use core::str;

use heapless::Vec;

/// Maximum stored length of one command line (excluding comment and terminator)
pub const LINE_CAPACITY: usize = 100;

/// Errors raised while assembling or reading a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Line longer than [`LINE_CAPACITY`]; the whole line was discarded
    LineOverflow,
    /// Trailing `*<n>` did not match the computed checksum
    ChecksumMismatch,
    /// A numeric field could not be parsed
    BadNumber,
    /// A colon-separated list had more items than the destination holds
    ArrayOverflow,
    /// A getter was called without a preceding successful `seen`
    NotSeen,
    /// A string field was empty or not valid text
    MissingString,
    /// The line does not start with a G, M or T command word
    NoCommand,
}

impl ParseError {
    /// Short human-readable description used in replies
    pub fn message(self) -> &'static str {
        match self {
            ParseError::LineOverflow => "line too long",
            ParseError::ChecksumMismatch => "checksum mismatch",
            ParseError::BadNumber => "malformed number",
            ParseError::ArrayOverflow => "too many values in list",
            ParseError::NotSeen => "value requested before its key letter",
            ParseError::MissingString => "missing string value",
            ParseError::NoCommand => "no G, M or T command",
        }
    }
}

/// Command word at the start of a line, e.g. `G1` or `T-1`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Command {
    /// `b'G'`, `b'M'` or `b'T'`
    pub letter: u8,
    /// Numeric code following the letter
    pub code: i32,
}

/// Fixed-capacity command line with field accessors
#[derive(Debug, Clone)]
pub struct LineBuffer {
    buffer: Vec<u8, LINE_CAPACITY>,
    /// Index of the key letter found by the last `seen`
    read_pointer: Option<usize>,
    /// After a `;` until the terminator
    in_comment: bool,
    /// Capacity exceeded; discarding until the terminator
    overflowed: bool,
    /// A complete line is held
    ready: bool,
    /// `N` value of the most recently terminated line
    line_number: Option<i32>,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    /// Create an empty line buffer
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            read_pointer: None,
            in_comment: false,
            overflowed: false,
            ready: false,
            line_number: None,
        }
    }

    /// Drop the held line and any partial input
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.read_pointer = None;
        self.in_comment = false;
        self.overflowed = false;
        self.ready = false;
        self.line_number = None;
    }

    /// Check if a complete line is held
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Feed one character
    ///
    /// Returns `Ok(true)` when this character completed a line,
    /// `Ok(false)` when more input is needed (blank and comment-only lines
    /// never complete), or an error when the finished line was rejected.
    /// A rejected line is already discarded. Feeding after a line became
    /// ready starts a new line.
    pub fn put(&mut self, c: u8) -> Result<bool, ParseError> {
        if self.ready {
            self.clear();
        }

        if matches!(c, b'\n' | b'\r' | 0) {
            return self.terminate();
        }

        if self.in_comment || self.overflowed {
            return Ok(false);
        }

        if c == b';' {
            self.in_comment = true;
            return Ok(false);
        }

        if self.buffer.push(c).is_err() {
            self.overflowed = true;
        }
        Ok(false)
    }

    /// Feed a whole line of text followed by a terminator
    pub fn put_line(&mut self, text: &[u8]) -> Result<bool, ParseError> {
        for &c in text {
            if matches!(c, b'\n' | b'\r' | 0) {
                break;
            }
            self.put(c)?;
        }
        self.put(b'\n')
    }

    fn terminate(&mut self) -> Result<bool, ParseError> {
        let overflowed = self.overflowed;
        self.in_comment = false;
        self.overflowed = false;
        self.read_pointer = None;

        if overflowed {
            self.buffer.clear();
            self.line_number = None;
            return Err(ParseError::LineOverflow);
        }

        // The checksum covers every byte the host sent before `*`,
        // leading whitespace included
        self.trim_end();
        let checked = self.verify_checksum();
        self.trim();
        self.line_number = self.parse_line_number();

        if let Err(e) = checked {
            self.buffer.clear();
            return Err(e);
        }
        if self.buffer.is_empty() {
            return Ok(false);
        }

        self.ready = true;
        Ok(true)
    }

    fn trim_end(&mut self) {
        while self.buffer.last().is_some_and(|b| b.is_ascii_whitespace()) {
            self.buffer.pop();
        }
    }

    fn trim(&mut self) {
        self.trim_end();
        let len = self.buffer.len();
        let start = self
            .buffer
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(len);
        if start > 0 {
            self.buffer.copy_within(start..len, 0);
            self.buffer.truncate(len - start);
        }
    }

    /// Verify and strip a trailing `*<n>` checksum, if present
    fn verify_checksum(&mut self) -> Result<(), ParseError> {
        let Some(star) = self.buffer.iter().rposition(|&b| b == b'*') else {
            return Ok(());
        };

        let computed = self.buffer[..star].iter().fold(0u8, |acc, &b| acc ^ b);
        let declared = str::from_utf8(&self.buffer[star + 1..])
            .ok()
            .map(str::trim)
            .and_then(|s| s.parse::<u16>().ok());

        if declared != Some(u16::from(computed)) {
            return Err(ParseError::ChecksumMismatch);
        }

        self.buffer.truncate(star);
        Ok(())
    }

    fn parse_line_number(&self) -> Option<i32> {
        if self.buffer.first() != Some(&b'N') {
            return None;
        }
        let (begin, end) = self.number_bounds(1, false);
        parse_long(&self.buffer[begin..end])
            .ok()
            .and_then(|n| i32::try_from(n).ok())
    }

    /// Line number (`N` field) of the last terminated line, if it had one
    ///
    /// Still available after a checksum rejection so the caller can
    /// request a resend.
    pub fn line_number(&self) -> Option<i32> {
        self.line_number
    }

    /// The held line, without comment and checksum
    pub fn as_str(&self) -> &str {
        str::from_utf8(&self.buffer).unwrap_or("")
    }

    /// Raw bytes of the held line
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Index just past the optional `N<int>` field and following spaces
    fn command_start(&self) -> usize {
        let mut pos = 0;
        if self.buffer.first() == Some(&b'N') {
            let (_, end) = self.number_bounds(1, false);
            pos = end;
        }
        self.skip_spaces(pos)
    }

    /// Parse the command word at the start of the line
    pub fn command(&self) -> Result<Command, ParseError> {
        let pos = self.command_start();
        let letter = *self.buffer.get(pos).ok_or(ParseError::NoCommand)?;
        if !matches!(letter, b'G' | b'M' | b'T') {
            return Err(ParseError::NoCommand);
        }

        let (begin, end) = self.number_bounds(pos + 1, false);
        if begin == end {
            // Bare `T` selects nothing
            return if letter == b'T' {
                Ok(Command { letter, code: -1 })
            } else {
                Err(ParseError::NoCommand)
            };
        }
        let code = parse_long(&self.buffer[begin..end])?;
        let code = i32::try_from(code).map_err(|_| ParseError::BadNumber)?;
        Ok(Command { letter, code })
    }

    /// Check if a key letter is present
    ///
    /// Letters inside double quotes are not keys. On success the position
    /// is remembered for the next getter.
    pub fn seen(&mut self, letter: u8) -> bool {
        self.read_pointer = None;
        if !self.ready {
            return false;
        }

        let mut quoted = false;
        for (i, &b) in self.buffer.iter().enumerate() {
            if b == b'"' {
                quoted = !quoted;
            } else if !quoted && b == letter {
                self.read_pointer = Some(i);
                return true;
            }
        }
        false
    }

    fn take_cursor(&mut self) -> Result<usize, ParseError> {
        self.read_pointer.take().ok_or(ParseError::NotSeen)
    }

    /// Float value after the last seen letter
    pub fn get_float(&mut self) -> Result<f32, ParseError> {
        let key = self.take_cursor()?;
        let (begin, end) = self.number_bounds(key + 1, true);
        parse_float(&self.buffer[begin..end])
    }

    /// Long integer value after the last seen letter
    pub fn get_long(&mut self) -> Result<i64, ParseError> {
        let key = self.take_cursor()?;
        let (begin, end) = self.number_bounds(key + 1, false);
        parse_long(&self.buffer[begin..end])
    }

    /// Integer value after the last seen letter
    pub fn get_int(&mut self) -> Result<i32, ParseError> {
        let value = self.get_long()?;
        i32::try_from(value).map_err(|_| ParseError::BadNumber)
    }

    /// String value after the last seen letter
    ///
    /// Either a double-quoted string (quotes stripped) or the raw text up
    /// to the next whitespace.
    pub fn get_string(&mut self) -> Result<&str, ParseError> {
        let key = self.take_cursor()?;
        let start = self.skip_spaces(key + 1);
        let bytes = &self.buffer[start..];

        let text = if bytes.first() == Some(&b'"') {
            let rest = &bytes[1..];
            let close = rest.iter().position(|&b| b == b'"').unwrap_or(rest.len());
            &rest[..close]
        } else {
            let end = bytes
                .iter()
                .position(|b| b.is_ascii_whitespace())
                .unwrap_or(bytes.len());
            &bytes[..end]
        };

        match str::from_utf8(text) {
            Ok(s) if !s.is_empty() => Ok(s),
            _ => Err(ParseError::MissingString),
        }
    }

    /// Everything after the command word, for commands taking a bare argument
    ///
    /// `M23 part.g` yields `part.g`.
    pub fn get_unprecedented_string(&self) -> Result<&str, ParseError> {
        let pos = self.command_start();
        let (_, end) = self.number_bounds(pos + 1, false);
        let start = self.skip_spaces(end.min(self.buffer.len()));
        match str::from_utf8(&self.buffer[start..]) {
            Ok(s) if !s.trim().is_empty() => Ok(s.trim()),
            _ => Err(ParseError::MissingString),
        }
    }

    /// Colon-separated floats after the last seen letter
    ///
    /// Returns the number of values written. If the list does not fit in
    /// `out`, nothing is written and `ArrayOverflow` is returned.
    pub fn get_float_array(&mut self, out: &mut [f32]) -> Result<usize, ParseError> {
        let start = self.take_cursor()? + 1;
        let count = self.for_each_item(start, true, |span| parse_float(span).map(|_| ()))?;
        if count > out.len() {
            return Err(ParseError::ArrayOverflow);
        }

        let mut i = 0;
        self.for_each_item(start, true, |span| {
            out[i] = parse_float(span)?;
            i += 1;
            Ok(())
        })?;
        Ok(count)
    }

    /// Colon-separated integers after the last seen letter
    ///
    /// Same contract as [`LineBuffer::get_float_array`].
    pub fn get_long_array(&mut self, out: &mut [i64]) -> Result<usize, ParseError> {
        let start = self.take_cursor()? + 1;
        let count = self.for_each_item(start, false, |span| parse_long(span).map(|_| ()))?;
        if count > out.len() {
            return Err(ParseError::ArrayOverflow);
        }

        let mut i = 0;
        self.for_each_item(start, false, |span| {
            out[i] = parse_long(span)?;
            i += 1;
            Ok(())
        })?;
        Ok(count)
    }

    fn for_each_item(
        &self,
        start: usize,
        float: bool,
        mut f: impl FnMut(&[u8]) -> Result<(), ParseError>,
    ) -> Result<usize, ParseError> {
        let mut pos = start;
        let mut count = 0;
        loop {
            let (begin, end) = self.number_bounds(pos, float);
            f(&self.buffer[begin..end])?;
            count += 1;
            if self.buffer.get(end) == Some(&b':') {
                pos = end + 1;
            } else {
                return Ok(count);
            }
        }
    }

    fn skip_spaces(&self, mut pos: usize) -> usize {
        while self.buffer.get(pos).is_some_and(|&b| b == b' ' || b == b'\t') {
            pos += 1;
        }
        pos
    }

    /// Bounds of the numeric token starting at `pos` (after optional spaces)
    fn number_bounds(&self, pos: usize, float: bool) -> (usize, usize) {
        let len = self.buffer.len();
        let begin = self.skip_spaces(pos.min(len));
        let mut end = begin;
        if self.buffer.get(end).is_some_and(|&b| b == b'+' || b == b'-') {
            end += 1;
        }
        while self
            .buffer
            .get(end)
            .is_some_and(|&b| b.is_ascii_digit() || (float && b == b'.'))
        {
            end += 1;
        }
        (begin, end)
    }
}

fn parse_float(span: &[u8]) -> Result<f32, ParseError> {
    str::from_utf8(span)
        .ok()
        .and_then(|s| s.parse::<f32>().ok())
        .ok_or(ParseError::BadNumber)
}

fn parse_long(span: &[u8]) -> Result<i64, ParseError> {
    str::from_utf8(span)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(ParseError::BadNumber)
}

//! Command execution errors
//!
//! Every failure a command can produce is a [`CommandError`]. Lower-level
//! errors convert into it so handlers can use `?`, and each variant has a
//! fixed message used in `Error: <message>` replies.

use crate::gcode::ParseError;
use crate::motion::Axis;
use crate::stack::StackError;
use crate::traits::StorageError;

/// Errors raised while executing a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// The line or one of its fields was malformed
    Parse(ParseError),
    /// Storage collaborator failure
    Storage(StorageError),
    /// A named file could not be opened
    FileNotFound,
    /// Macro call nested deeper than the macro stack allows
    MacroStackOverflow,
    /// `M120` with every modal slot in use
    ModalStackOverflow,
    /// `M121` with nothing saved
    ModalStackUnderflow,
    /// No handler for this command word
    UnknownCode { letter: u8, code: i32 },
    /// A required parameter letter was absent
    MissingParameter(u8),
    /// Tool number not defined
    UnknownTool(i32),
    /// No room to define another tool
    ToolTableFull,
    /// Tool definition names an extruder or heater that does not exist
    InvalidTool,
    /// The tool has a heater fault and cannot be selected
    HeaterFault,
    /// A probing move ended without the probe triggering
    ProbeNotTriggered,
    /// Probe points do not define a plane
    BedFitFailed,
    /// Probe point index out of range
    InvalidProbePoint,
    /// Target outside the configured axis range
    AxisLimit(Axis),
    /// `M99` outside a macro
    NotInMacro,
    /// `M24` without a selected file
    NoFileSelected,
    /// A reply did not fit its buffer
    ReplyOverflow,
    /// The command was abandoned by a stop
    Cancelled,
}

impl CommandError {
    /// Short human-readable description used in replies
    pub fn message(self) -> &'static str {
        match self {
            CommandError::Parse(e) => e.message(),
            CommandError::Storage(e) => e.message(),
            CommandError::FileNotFound => "file not found",
            CommandError::MacroStackOverflow => "macro stack overflow",
            CommandError::ModalStackOverflow => "push(): stack overflow",
            CommandError::ModalStackUnderflow => "pop(): stack underflow",
            CommandError::UnknownCode { .. } => "unsupported command",
            CommandError::MissingParameter(_) => "missing parameter",
            CommandError::UnknownTool(_) => "invalid tool number",
            CommandError::ToolTableFull => "too many tools",
            CommandError::InvalidTool => "invalid tool definition",
            CommandError::HeaterFault => "tool has a heater fault",
            CommandError::ProbeNotTriggered => "probe not triggered",
            CommandError::BedFitFailed => "bed probe points do not define a plane",
            CommandError::InvalidProbePoint => "invalid probe point",
            CommandError::AxisLimit(_) => "target outside axis limits",
            CommandError::NotInMacro => "not in a macro",
            CommandError::NoFileSelected => "no file selected",
            CommandError::ReplyOverflow => "reply too long",
            CommandError::Cancelled => "cancelled",
        }
    }
}

impl From<ParseError> for CommandError {
    fn from(e: ParseError) -> Self {
        CommandError::Parse(e)
    }
}

impl From<StorageError> for CommandError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => CommandError::FileNotFound,
            other => CommandError::Storage(other),
        }
    }
}

impl From<StackError> for CommandError {
    fn from(e: StackError) -> Self {
        match e {
            StackError::Overflow => CommandError::ModalStackOverflow,
            StackError::Underflow => CommandError::ModalStackUnderflow,
        }
    }
}

//! Macro nesting frames
//!
//! Each frame is a suspended macro file plus what is needed to return
//! from it: the modal context of the caller and which stream to
//! acknowledge when the outermost macro finishes.

use super::modal::ModalState;
use super::{BoundedStack, StackError};
use crate::stream::Origin;
use crate::traits::FileHandle;

/// Maximum macro nesting depth
pub const MACRO_STACK_DEPTH: usize = 5;

/// One running macro file
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MacroFrame {
    /// Open macro file; its read position is the resume point
    pub file: FileHandle,
    /// Modal context at the moment of the call
    pub saved: ModalState,
    /// Stream whose command started this macro, `None` for internal calls
    pub caller: Option<Origin>,
}

/// Stack of running macros, innermost on top
#[derive(Debug, Clone, Default)]
pub struct MacroStack {
    stack: BoundedStack<MacroFrame, MACRO_STACK_DEPTH>,
}

impl MacroStack {
    /// Create an empty stack
    pub const fn new() -> Self {
        Self {
            stack: BoundedStack::new(),
        }
    }

    /// Enter a macro
    pub fn push(&mut self, frame: MacroFrame) -> Result<(), StackError> {
        self.stack.push(frame)
    }

    /// Leave the innermost macro
    pub fn pop(&mut self) -> Result<MacroFrame, StackError> {
        self.stack.pop()
    }

    /// Innermost macro
    pub fn top(&self) -> Option<&MacroFrame> {
        self.stack.top()
    }

    /// Stream that started the outermost macro
    ///
    /// Output from any nesting level is reported there.
    pub fn root_caller(&self) -> Option<Origin> {
        self.stack.bottom().and_then(|f| f.caller)
    }

    /// Current nesting depth
    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    /// Check if no macro is running
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Check if another macro call would overflow
    pub fn is_full(&self) -> bool {
        self.stack.is_full()
    }
}

//! Modal context and its save/restore stack (`M120` / `M121`)

use super::{BoundedStack, StackError};

/// Depth of the modal context stack
pub const MODAL_STACK_DEPTH: usize = 5;

/// Modal state that survives from one command to the next
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModalState {
    /// Feedrate in mm/s
    pub feedrate: f32,
    /// X, Y, Z coordinates are relative (`G91`)
    pub axes_relative: bool,
    /// Extruder coordinates are relative (`M83`)
    pub drives_relative: bool,
}

impl ModalState {
    /// Power-on modal state with the given feedrate
    pub const fn with_feedrate(feedrate: f32) -> Self {
        Self {
            feedrate,
            axes_relative: false,
            drives_relative: true,
        }
    }
}

/// Saved modal contexts
#[derive(Debug, Clone, Default)]
pub struct ModalStack {
    stack: BoundedStack<ModalState, MODAL_STACK_DEPTH>,
}

impl ModalStack {
    /// Create an empty stack
    pub const fn new() -> Self {
        Self {
            stack: BoundedStack::new(),
        }
    }

    /// Save a context; fails without effect when full
    pub fn push(&mut self, state: ModalState) -> Result<(), StackError> {
        self.stack.push(state)
    }

    /// Restore the most recently saved context
    pub fn pop(&mut self) -> Result<ModalState, StackError> {
        self.stack.pop()
    }

    /// Number of saved contexts
    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    /// Drop every saved context
    pub fn clear(&mut self) {
        while self.stack.pop().is_ok() {}
    }
}

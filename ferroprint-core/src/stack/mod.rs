//! Bounded stacks for modal context and macro nesting
//!
//! Both stacks have a fixed depth. Overflow is a reachable runtime
//! condition (deep macro nesting, unbalanced push/pop in a file), so it
//! is reported as an error rather than asserted.

pub mod frames;
pub mod modal;

pub use frames::{MacroFrame, MacroStack, MACRO_STACK_DEPTH};
pub use modal::{ModalStack, ModalState, MODAL_STACK_DEPTH};

use heapless::Vec;

/// Stack misuse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StackError {
    /// Push onto a full stack
    Overflow,
    /// Pop from an empty stack
    Underflow,
}

/// Fixed-capacity LIFO stack
///
/// A failed push leaves existing entries untouched.
#[derive(Debug, Clone)]
pub struct BoundedStack<T, const N: usize> {
    entries: Vec<T, N>,
}

impl<T, const N: usize> Default for BoundedStack<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> BoundedStack<T, N> {
    /// Create an empty stack
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Push an entry
    pub fn push(&mut self, entry: T) -> Result<(), StackError> {
        self.entries.push(entry).map_err(|_| StackError::Overflow)
    }

    /// Pop the most recent entry
    pub fn pop(&mut self) -> Result<T, StackError> {
        self.entries.pop().ok_or(StackError::Underflow)
    }

    /// Most recent entry
    pub fn top(&self) -> Option<&T> {
        self.entries.last()
    }

    /// Oldest entry
    pub fn bottom(&self) -> Option<&T> {
        self.entries.first()
    }

    /// Number of entries
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    /// Check if the stack is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if another push would fail
    pub fn is_full(&self) -> bool {
        self.entries.len() == N
    }
}

//! Host link collaborator trait
//!
//! Network and serial links are polled, never pushed: the engine asks for
//! a line only when it has room for one.

/// Trait for a line-oriented host link
pub trait Transport {
    /// Check if a complete line is waiting
    fn has_line(&self) -> bool;

    /// Take the next line (without terminator) into `buf`
    ///
    /// Same truncation contract as [`crate::traits::Storage::read_line`].
    fn next_line(&mut self, buf: &mut [u8]) -> Option<usize>;

    /// Send a reply line to the host
    fn reply(&mut self, text: &str);
}

//! G-code line parsing
//!
//! Turns a stream of characters into one command line at a time and
//! exposes its letter/value fields.

pub mod buffer;

pub use buffer::{Command, LineBuffer, ParseError, LINE_CAPACITY};

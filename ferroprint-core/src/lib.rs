//! Board-agnostic G-code execution core
//!
//! This crate contains everything between "a line of text arrived" and
//! "a move was handed to the planner", without depending on any specific
//! hardware:
//!
//! - Line parser for G/M/T commands
//! - Input stream registry (macro, file, network, serial)
//! - Bounded modal-context and macro-nesting stacks
//! - Multi-tick canned cycles (homing, probing, tool change, dwell)
//! - The tick-driven execution engine
//! - Collaborator traits for motion, heaters, storage and host links
//!
//! Nothing here blocks. Anything that has to wait is expressed as a
//! pending state and re-checked on the next call to [`Engine::spin`].

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

mod fmt;

pub mod bed;
pub mod config;
pub mod cycles;
pub mod engine;
pub mod error;
pub mod gcode;
pub mod motion;
pub mod stack;
pub mod stream;
pub mod tool;
pub mod traits;

#[cfg(test)]
mod testing;

pub use engine::{Engine, Io, Outcome};
pub use error::CommandError;

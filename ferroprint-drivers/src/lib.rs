//! Collaborators for the Ferroprint engine
//!
//! Host-side and simulated implementations of the core collaborator
//! traits:
//!
//! - Motion: queued planner with virtual endstops and a Z probe
//! - Heater: bang-bang heater bank over a first-order thermal model
//! - Storage: fixed-capacity RAM file system
//! - Link: line-assembling host transport
//!
//! [`machine::Machine`] wires them to an [`ferroprint_core::Engine`] and
//! runs the whole controller one tick at a time.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

mod fmt;

pub mod heater;
pub mod link;
pub mod machine;
pub mod motion;
pub mod storage;

pub use heater::{HeaterBank, HeaterModel};
pub use link::LineLink;
pub use machine::Machine;
pub use motion::{QueuedMotion, SimProbe};
pub use storage::RamStorage;

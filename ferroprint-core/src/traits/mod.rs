//! Collaborator traits
//!
//! These traits define the narrow interfaces between the execution engine
//! and the parts of the controller it drives but does not implement:
//! motion planning, heaters, file storage and host links.

pub mod motion;
pub mod storage;
pub mod thermal;
pub mod transport;

pub use motion::{Motion, Submit};
pub use storage::{FileHandle, OpenMode, Storage, StorageError};
pub use thermal::{heater_for_extruder, HeaterId, Thermal, ABS_ZERO, BED_HEATER, MAX_HEATERS};
pub use transport::Transport;

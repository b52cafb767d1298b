//! File storage implementations

pub mod ram;

pub use ram::{RamStorage, MAX_OPEN_FILES};

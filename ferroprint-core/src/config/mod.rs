//! Machine configuration
//!
//! Board-agnostic settings stored as postcard binary data when the
//! `serde` feature is enabled.

pub mod types;

pub use types::*;

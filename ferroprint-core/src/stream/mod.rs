//! Input streams and their priority
//!
//! Every source of command text is an [`InputStream`] with its own line
//! buffer, so a half-received serial line never interferes with a line
//! arriving over the network. The [`StreamRegistry`] owns one stream per
//! [`Origin`] and decides which ready stream is served next.

pub mod origin;
pub mod registry;

pub use origin::Origin;
pub use registry::{Capture, InputStream, StreamRegistry};

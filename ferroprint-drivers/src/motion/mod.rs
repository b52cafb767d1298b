//! Motion planner implementations

pub mod queue;

pub use queue::{QueuedMotion, SimProbe, QUEUE_DEPTH};

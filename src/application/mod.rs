//! Application layer - Composition services that drive the ports.

pub mod cleanup;
pub mod composer;
pub mod concat;
pub mod governor;
pub mod pipeline;

pub use cleanup::release_artifacts;
pub use governor::{ComposeContext, SegmentGate};
pub use pipeline::ParallelComposer;

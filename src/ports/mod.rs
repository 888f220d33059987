//! Ports - Traits at the external process seams.

pub mod encoder;
pub mod prober;

pub use encoder::EncoderExecutor;
pub use prober::MediaProber;

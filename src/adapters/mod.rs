//! Adapters - Concrete implementations of the ports.

pub mod ffmpeg;

pub use ffmpeg::{FfmpegExecutor, FfprobeProber};

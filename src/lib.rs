//! Barstack - stacks a rendered bar video under (or over) a source video.
//!
//! Long inputs are split into fixed-length segments, composed concurrently
//! through ffmpeg, and joined back together.
//!
//! Hexagonal Architecture:
//! - domain/: Segments, job config and progress, probe data
//! - ports/: Encoder and prober traits
//! - adapters/: ffmpeg / ffprobe subprocess implementations
//! - application/: Composer, admission gates, concatenation, job lifecycle
//! - config: Environment configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;

// Re-exports for convenience
pub use application::{ComposeContext, ParallelComposer};
pub use config::ComposeSettings;
pub use domain::jobs::{CompositionJobConfig, OverlayPosition};
pub use error::ComposeError;

//! Error types for the composition pipeline.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("input not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid media: {0}")]
    InvalidMedia(String),

    #[error("segment {index} composition failed: {diagnostics}")]
    SegmentCompositionFailed { index: usize, diagnostics: String },

    #[error("partial failure: {succeeded} of {total} segments succeeded")]
    PartialFailure { succeeded: usize, total: usize },

    #[error("concatenation failed: {0}")]
    ConcatenationFailed(String),

    #[error("no segments to concatenate")]
    EmptyInput,

    #[error("failed to launch external process: {0}")]
    Process(#[from] io::Error),

    #[error("composition service is shutting down")]
    Unavailable,
}

/// Keeps only the last `max_chars` characters of a process diagnostic stream.
pub fn diagnostic_tail(stderr: &[u8], max_chars: usize) -> String {
    let text = String::from_utf8_lossy(stderr);
    let total = text.chars().count();
    if total <= max_chars {
        return text.trim().to_string();
    }
    text.chars().skip(total - max_chars).collect::<String>().trim().to_string()
}

use crate::error::ComposeError;
use std::path::PathBuf;

/// Lifecycle of a single segment. Terminal states carry their payload so a
/// finished segment always has an artifact and a failed one always has a reason.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentStatus {
    Queued,
    Running,
    Done(PathBuf),
    Failed(String),
}

impl SegmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SegmentStatus::Done(_) | SegmentStatus::Failed(_))
    }
}

/// A time window of the source/bar pair, composed independently.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Zero-based, defines the final ordering
    pub index: usize,
    /// Start time in seconds
    pub start: f64,
    /// Duration in seconds
    pub duration: f64,
    pub status: SegmentStatus,
}

impl Segment {
    pub fn new(index: usize, start: f64, duration: f64) -> Self {
        Self {
            index,
            start,
            duration,
            status: SegmentStatus::Queued,
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn output_artifact(&self) -> Option<&PathBuf> {
        match &self.status {
            SegmentStatus::Done(path) => Some(path),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            SegmentStatus::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Fraction of a chunk below which a trailing remainder is treated as rounding error.
const COUNT_TOLERANCE: f64 = 1e-9;

/// Splits `[0, duration)` into contiguous windows of at most `chunk_seconds`.
/// Only the last window may be shorter.
pub fn calculate_segments(duration: f64, chunk_seconds: f64) -> Result<Vec<Segment>, ComposeError> {
    if !(chunk_seconds > 0.0) {
        return Err(ComposeError::InvalidArgument(format!(
            "chunk_seconds must be positive, got {}",
            chunk_seconds
        )));
    }
    if !duration.is_finite() {
        return Err(ComposeError::InvalidArgument(format!(
            "duration must be finite, got {}",
            duration
        )));
    }

    if !(duration > 0.0) {
        return Ok(Vec::new());
    }

    // A remainder within float noise of zero is not a window of its own.
    let count = (duration / chunk_seconds - COUNT_TOLERANCE).ceil().max(1.0) as usize;
    let mut segments = Vec::new();
    let mut start = 0.0;

    for index in 0..count {
        // the last window ends exactly at `duration`
        let segment_duration = if index + 1 == count {
            duration - start
        } else {
            chunk_seconds
        };
        segments.push(Segment::new(index, start, segment_duration));
        start += segment_duration;
    }

    Ok(segments)
}

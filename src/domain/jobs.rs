use super::segments::{Segment, SegmentStatus};
use crate::error::ComposeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where the bar is stacked relative to the source frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayPosition {
    Top,
    #[default]
    Bottom,
}

impl FromStr for OverlayPosition {
    type Err = ComposeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top" => Ok(OverlayPosition::Top),
            "bottom" => Ok(OverlayPosition::Bottom),
            other => Err(ComposeError::InvalidArgument(format!(
                "position must be 'top' or 'bottom', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for OverlayPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlayPosition::Top => write!(f, "top"),
            OverlayPosition::Bottom => write!(f, "bottom"),
        }
    }
}

/// Per-request parameters, validated once and read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionJobConfig {
    position: OverlayPosition,
    chunk_seconds: f64,
    max_workers: usize,
    keyframe_multiplier: u32,
}

impl CompositionJobConfig {
    pub fn new(
        position: OverlayPosition,
        chunk_seconds: f64,
        max_workers: usize,
        keyframe_multiplier: u32,
    ) -> Result<Self, ComposeError> {
        if !(chunk_seconds > 0.0) || !chunk_seconds.is_finite() {
            return Err(ComposeError::InvalidArgument(format!(
                "chunk_seconds must be positive, got {}",
                chunk_seconds
            )));
        }
        if max_workers == 0 {
            return Err(ComposeError::InvalidArgument(
                "max_workers must be positive, got 0".to_string(),
            ));
        }
        if keyframe_multiplier == 0 {
            return Err(ComposeError::InvalidArgument(
                "keyframe_multiplier must be at least 1, got 0".to_string(),
            ));
        }

        Ok(Self {
            position,
            chunk_seconds,
            max_workers,
            keyframe_multiplier,
        })
    }

    pub fn position(&self) -> OverlayPosition {
        self.position
    }

    pub fn chunk_seconds(&self) -> f64 {
        self.chunk_seconds
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn keyframe_multiplier(&self) -> u32 {
        self.keyframe_multiplier
    }

    /// GOP length in frames for a source running at `fps`.
    pub fn gop(&self, fps: f64) -> u32 {
        ((fps * self.keyframe_multiplier as f64).floor() as u32).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Planning,
    Composing,
    Concatenating,
    Succeeded,
    Failed,
}

/// Mutable aggregate of one job, owned by the lifecycle manager.
#[derive(Debug, Clone)]
pub struct JobProgress {
    pub job_id: String,
    pub stage: JobStage,
    pub segments: Vec<Segment>,
    pub completed_segments: usize,
    pub failed_segments: usize,
    pub error: Option<String>,
}

impl JobProgress {
    pub fn new(job_id: String) -> Self {
        Self {
            job_id,
            stage: JobStage::Planning,
            segments: Vec::new(),
            completed_segments: 0,
            failed_segments: 0,
            error: None,
        }
    }

    pub fn total_segments(&self) -> usize {
        self.segments.len()
    }

    pub fn mark_running(&mut self, index: usize) {
        if let Some(segment) = self.segments.get_mut(index) {
            if segment.status == SegmentStatus::Queued {
                segment.status = SegmentStatus::Running;
            }
        }
    }

    /// Records a terminal outcome. Segments that already settled are left as is.
    pub fn settle(&mut self, index: usize, outcome: Result<std::path::PathBuf, String>) {
        let Some(segment) = self.segments.get_mut(index) else {
            return;
        };
        if segment.status.is_terminal() {
            return;
        }
        match outcome {
            Ok(path) => {
                segment.status = SegmentStatus::Done(path);
                self.completed_segments += 1;
            }
            Err(reason) => {
                segment.status = SegmentStatus::Failed(reason);
                self.failed_segments += 1;
            }
        }
    }

    /// Artifacts of finished segments, in index order.
    pub fn done_artifacts(&self) -> Vec<std::path::PathBuf> {
        self.segments
            .iter()
            .filter_map(|segment| segment.output_artifact().cloned())
            .collect()
    }

    pub fn all_done(&self) -> bool {
        !self.segments.is_empty() && self.completed_segments == self.segments.len()
    }

    pub fn fail(&mut self, error: &ComposeError) {
        self.stage = JobStage::Failed;
        self.error = Some(error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_position_parsing() {
        assert_eq!("top".parse::<OverlayPosition>().unwrap(), OverlayPosition::Top);
        assert_eq!(
            "bottom".parse::<OverlayPosition>().unwrap(),
            OverlayPosition::Bottom
        );
        assert!(matches!(
            "middle".parse::<OverlayPosition>(),
            Err(ComposeError::InvalidArgument(_))
        ));
        assert_eq!(OverlayPosition::default(), OverlayPosition::Bottom);
    }

    #[test]
    fn test_config_validation() {
        assert!(CompositionJobConfig::new(OverlayPosition::Top, 60.0, 2, 2).is_ok());

        let err = CompositionJobConfig::new(OverlayPosition::Top, 0.0, 2, 2).unwrap_err();
        assert!(err.to_string().contains("chunk_seconds must be positive"));

        let err = CompositionJobConfig::new(OverlayPosition::Top, 60.0, 0, 2).unwrap_err();
        assert!(err.to_string().contains("max_workers must be positive"));

        assert!(matches!(
            CompositionJobConfig::new(OverlayPosition::Top, 60.0, 2, 0),
            Err(ComposeError::InvalidArgument(_))
        ));
        assert!(matches!(
            CompositionJobConfig::new(OverlayPosition::Top, f64::INFINITY, 2, 1),
            Err(ComposeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_gop_from_fps() {
        let config = CompositionJobConfig::new(OverlayPosition::Bottom, 60.0, 2, 2).unwrap();
        assert_eq!(config.gop(30.0), 60);
        assert_eq!(config.gop(29.97), 59);
        assert_eq!(config.gop(0.1), 1);
    }

    #[test]
    fn test_progress_settles_once() {
        let mut progress = JobProgress::new("job".to_string());
        progress.segments = vec![Segment::new(0, 0.0, 60.0), Segment::new(1, 60.0, 10.0)];

        progress.mark_running(0);
        assert_eq!(progress.segments[0].status, SegmentStatus::Running);

        progress.settle(0, Ok(PathBuf::from("a.mp4")));
        progress.settle(0, Err("late".to_string()));
        progress.settle(1, Err("boom".to_string()));

        assert_eq!(progress.completed_segments, 1);
        assert_eq!(progress.failed_segments, 1);
        assert_eq!(progress.done_artifacts(), vec![PathBuf::from("a.mp4")]);
        assert!(!progress.all_done());

        // terminal segments never go back to running
        progress.mark_running(1);
        assert_eq!(progress.segments[1].status, SegmentStatus::Failed("boom".to_string()));
    }
}

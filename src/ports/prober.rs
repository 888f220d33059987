use crate::domain::probe::VideoInfo;
use crate::error::ComposeError;
use async_trait::async_trait;
use std::path::Path;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProber: Send + Sync {
    /// Describes the video at `path` (dimensions, frame rate, duration).
    async fn probe(&self, path: &Path) -> Result<VideoInfo, ComposeError>;
}

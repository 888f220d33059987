use crate::domain::probe::VideoInfo;
use crate::error::{diagnostic_tail, ComposeError};
use crate::ports::encoder::EncoderExecutor;
use crate::ports::prober::MediaProber;
use async_trait::async_trait;
use serde_json::Value;
use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::debug;

const PROBE_DIAGNOSTIC_CHARS: usize = 500;

/// Runs `ffmpeg` (or a configured replacement binary) as a child process.
#[derive(Clone, Debug)]
pub struct FfmpegExecutor {
    binary: OsString,
}

impl FfmpegExecutor {
    pub fn new(binary: impl Into<OsString>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfmpegExecutor {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl EncoderExecutor for FfmpegExecutor {
    async fn run_encoder(&self, args: Vec<OsString>) -> io::Result<Output> {
        debug!(binary = ?self.binary, ?args, "spawning encoder");
        Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
    }
}

#[derive(Clone, Debug)]
pub struct FfprobeProber {
    binary: OsString,
}

impl FfprobeProber {
    pub fn new(binary: impl Into<OsString>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> Result<VideoInfo, ComposeError> {
        let output = Command::new(&self.binary)
            .arg("-v")
            .arg("error")
            .arg("-show_format")
            .arg("-show_streams")
            .arg("-print_format")
            .arg("json")
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(ComposeError::InvalidMedia(format!(
                "probing {} failed: {}",
                path.display(),
                diagnostic_tail(&output.stderr, PROBE_DIAGNOSTIC_CHARS)
            )));
        }

        let probe: Value = serde_json::from_slice(&output.stdout).map_err(|e| {
            ComposeError::InvalidMedia(format!("unreadable probe output for {}: {}", path.display(), e))
        })?;

        VideoInfo::from_ffprobe_json(&probe)
    }
}

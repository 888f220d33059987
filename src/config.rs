//! Configuration loaded from the environment (and `.env` when present).

use crate::domain::jobs::{CompositionJobConfig, OverlayPosition};
use crate::error::ComposeError;
use std::env;

pub const DEFAULT_CHUNK_SECONDS: u64 = 300;
pub const DEFAULT_MAX_WORKERS: usize = 2;
pub const DEFAULT_MAX_ACTIVE_JOBS: usize = 2;
pub const DEFAULT_KEYFRAME_MULTIPLIER: u32 = 2;

#[derive(Clone, Debug)]
pub struct ComposeSettings {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    /// Default segment length in seconds
    pub chunk_seconds: u64,
    /// Default per-job bound on concurrent segment encodes
    pub max_workers: usize,
    /// Process-wide bound on concurrent composition jobs
    pub max_active_jobs: usize,
    /// GOP = fps * keyframe_multiplier
    pub keyframe_multiplier: u32,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
}

/// Positive integer or `default` when the value is missing, malformed or not positive.
pub fn parse_positive<T>(value: Option<String>, default: T) -> T
where
    T: std::str::FromStr + PartialOrd + Default,
{
    value
        .and_then(|raw| raw.trim().parse::<T>().ok())
        .filter(|parsed| *parsed > T::default())
        .unwrap_or(default)
}

impl ComposeSettings {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            addr: env::var("ADDR").unwrap_or_else(|_| String::from("127.0.0.1")),
            port: env::var("PORT").unwrap_or_else(|_| String::from("3000")),
            chunk_seconds: parse_positive(env::var("COMPOSE_CHUNK_SECONDS").ok(), DEFAULT_CHUNK_SECONDS),
            max_workers: parse_positive(env::var("COMPOSE_MAX_WORKERS").ok(), DEFAULT_MAX_WORKERS),
            max_active_jobs: parse_positive(
                env::var("COMPOSE_MAX_ACTIVE_JOBS").ok(),
                DEFAULT_MAX_ACTIVE_JOBS,
            ),
            keyframe_multiplier: parse_positive(
                env::var("COMPOSE_KEYFRAME_MULTIPLIER").ok(),
                DEFAULT_KEYFRAME_MULTIPLIER,
            ),
            ffmpeg_bin: env::var("FFMPEG_BIN").unwrap_or_else(|_| String::from("ffmpeg")),
            ffprobe_bin: env::var("FFPROBE_BIN").unwrap_or_else(|_| String::from("ffprobe")),
        }
    }

    /// Job config with per-request overrides falling back to these defaults.
    pub fn job_config(
        &self,
        position: OverlayPosition,
        chunk_seconds: Option<f64>,
        max_workers: Option<usize>,
        keyframe_multiplier: Option<u32>,
    ) -> Result<CompositionJobConfig, ComposeError> {
        CompositionJobConfig::new(
            position,
            chunk_seconds.unwrap_or(self.chunk_seconds as f64),
            max_workers.unwrap_or(self.max_workers),
            keyframe_multiplier.unwrap_or(self.keyframe_multiplier),
        )
    }
}

impl Default for ComposeSettings {
    fn default() -> Self {
        Self {
            addr: String::from("127.0.0.1"),
            port: String::from("3000"),
            chunk_seconds: DEFAULT_CHUNK_SECONDS,
            max_workers: DEFAULT_MAX_WORKERS,
            max_active_jobs: DEFAULT_MAX_ACTIVE_JOBS,
            keyframe_multiplier: DEFAULT_KEYFRAME_MULTIPLIER,
            ffmpeg_bin: String::from("ffmpeg"),
            ffprobe_bin: String::from("ffprobe"),
        }
    }
}

use crate::error::ComposeError;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// What the pipeline needs to know about the source video.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Seconds
    pub duration: f64,
    pub has_audio: bool,
}

fn frame_rate_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(\d+(?:\.\d+)?)(?:/(\d+(?:\.\d+)?))?\s*$").expect("valid frame rate regex")
    })
}

/// Parses ffprobe's `30000/1001` style rationals (or a plain number).
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let caps = frame_rate_regex().captures(raw)?;
    let num: f64 = caps.get(1)?.as_str().parse().ok()?;
    let den: f64 = match caps.get(2) {
        Some(den) => den.as_str().parse().ok()?,
        None => 1.0,
    };
    if den == 0.0 {
        return None;
    }
    let fps = num / den;
    (fps > 0.0).then_some(fps)
}

fn as_seconds(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn codec_type(stream: &Value) -> Option<&str> {
    stream.get("codec_type").and_then(|t| t.as_str())
}

impl VideoInfo {
    /// Builds from `ffprobe -show_format -show_streams -print_format json` output.
    pub fn from_ffprobe_json(probe: &Value) -> Result<Self, ComposeError> {
        let streams = probe
            .get("streams")
            .and_then(|streams| streams.as_array())
            .ok_or_else(|| ComposeError::InvalidMedia("probe output has no streams".to_string()))?;

        let video = streams
            .iter()
            .find(|stream| codec_type(stream) == Some("video"))
            .ok_or_else(|| ComposeError::InvalidMedia("no video stream found".to_string()))?;
        let has_audio = streams
            .iter()
            .any(|stream| codec_type(stream) == Some("audio"));

        let width = video.get("width").and_then(|w| w.as_u64()).unwrap_or(0) as u32;
        let height = video.get("height").and_then(|h| h.as_u64()).unwrap_or(0) as u32;
        if width == 0 {
            return Err(ComposeError::InvalidMedia(
                "video stream has no width".to_string(),
            ));
        }

        let fps = ["r_frame_rate", "avg_frame_rate"]
            .iter()
            .filter_map(|key| video.get(*key).and_then(|v| v.as_str()))
            .find_map(parse_frame_rate)
            .ok_or_else(|| {
                ComposeError::InvalidMedia("video stream has no usable frame rate".to_string())
            })?;

        let duration = as_seconds(probe.get("format").and_then(|f| f.get("duration")))
            .or_else(|| as_seconds(video.get("duration")))
            .unwrap_or(0.0);

        Ok(VideoInfo {
            width,
            height,
            fps,
            duration,
            has_audio,
        })
    }
}

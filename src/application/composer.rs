use crate::domain::jobs::{CompositionJobConfig, OverlayPosition};
use crate::domain::probe::VideoInfo;
use crate::domain::segments::Segment;
use crate::error::{diagnostic_tail, ComposeError};
use crate::ports::encoder::EncoderExecutor;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const VIDEO_CODEC: &str = "libx264";
pub const CRF: &str = "18";
pub const PRESET: &str = "fast";
pub const AUDIO_CODEC: &str = "aac";
pub const AUDIO_BITRATE: &str = "128k";

/// Characters of encoder stderr kept in an error.
pub const DIAGNOSTIC_TAIL_CHARS: usize = 500;

fn os(value: impl Into<OsString>) -> OsString {
    value.into()
}

/// `[bar]` is scaled to the source width then stacked above or below `[0:v]`.
pub fn stack_filter(position: OverlayPosition, source_width: u32) -> String {
    let scale = format!("[1:v]scale={}:-1[bar]", source_width);
    match position {
        OverlayPosition::Top => format!("{};[bar][0:v]vstack=inputs=2[out]", scale),
        OverlayPosition::Bottom => format!("{};[0:v][bar]vstack=inputs=2[out]", scale),
    }
}

fn video_args() -> Vec<OsString> {
    ["-c:v", VIDEO_CODEC, "-crf", CRF, "-preset", PRESET]
        .into_iter()
        .map(os)
        .collect()
}

fn audio_args() -> Vec<OsString> {
    ["-c:a", AUDIO_CODEC, "-b:a", AUDIO_BITRATE]
        .into_iter()
        .map(os)
        .collect()
}

/// Constant-quality video and AAC audio settings shared by every encode.
pub fn quality_args() -> Vec<OsString> {
    let mut args = video_args();
    args.extend(audio_args());
    args
}

/// Filter graph, stream mapping and codecs. Source audio is carried over
/// when the probe found any, otherwise the output has no audio track.
fn stack_mapping(position: OverlayPosition, info: &VideoInfo) -> Vec<OsString> {
    let mut args = vec![
        os("-filter_complex"),
        os(stack_filter(position, info.width)),
        os("-map"),
        os("[out]"),
    ];
    args.extend(video_args());
    if info.has_audio {
        args.extend([os("-map"), os("0:a")]);
        args.extend(audio_args());
    } else {
        args.push(os("-an"));
    }
    args
}

/// Encoder arguments for one time-windowed segment with a fixed GOP.
pub fn segment_args(
    source: &Path,
    bar: &Path,
    segment: &Segment,
    output: &Path,
    config: &CompositionJobConfig,
    info: &VideoInfo,
) -> Vec<OsString> {
    let start = segment.start.to_string();
    let duration = segment.duration.to_string();
    let gop = config.gop(info.fps).to_string();

    let mut args = vec![os("-y")];
    for input in [source, bar] {
        args.extend([
            os("-ss"),
            os(&start),
            os("-t"),
            os(&duration),
            os("-i"),
            input.as_os_str().to_owned(),
        ]);
    }
    args.extend(stack_mapping(config.position(), info));
    // no scene-cut keyframes: spacing stays exactly one GOP
    args.extend([
        os("-g"),
        os(&gop),
        os("-keyint_min"),
        os(&gop),
        os("-sc_threshold"),
        os("0"),
        os("-reset_timestamps"),
        os("1"),
        os("-fflags"),
        os("+genpts"),
    ]);
    args.push(output.as_os_str().to_owned());
    args
}

/// Encoder arguments for composing the whole timeline in one pass.
pub fn single_pass_args(
    source: &Path,
    bar: &Path,
    output: &Path,
    position: OverlayPosition,
    info: &VideoInfo,
) -> Vec<OsString> {
    let mut args = vec![
        os("-y"),
        os("-i"),
        source.as_os_str().to_owned(),
        os("-i"),
        bar.as_os_str().to_owned(),
    ];
    args.extend(stack_mapping(position, info));
    args.push(output.as_os_str().to_owned());
    args
}

/// Deterministic artifact path for a segment, next to the final output.
pub fn segment_output_path(output: &Path, index: usize) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output.with_file_name(format!("{}.segment_{:04}.mp4", stem, index))
}

pub async fn compose_segment(
    runner: &impl EncoderExecutor,
    source: &Path,
    bar: &Path,
    segment: &Segment,
    output: &Path,
    config: &CompositionJobConfig,
    info: &VideoInfo,
) -> Result<PathBuf, ComposeError> {
    let args = segment_args(source, bar, segment, output, config, info);
    let process = runner.run_encoder(args).await?;

    if !process.status.success() {
        let diagnostics = diagnostic_tail(&process.stderr, DIAGNOSTIC_TAIL_CHARS);
        warn!(segment = segment.index, status = %process.status, "segment encode failed");
        return Err(ComposeError::SegmentCompositionFailed {
            index: segment.index,
            diagnostics,
        });
    }

    info!(
        segment = segment.index,
        start = segment.start,
        duration = segment.duration,
        output = %output.display(),
        "segment composed"
    );
    Ok(output.to_path_buf())
}

/// Short inputs skip planning overhead and are composed in a single encode.
pub async fn compose_single_pass(
    runner: &impl EncoderExecutor,
    source: &Path,
    bar: &Path,
    output: &Path,
    position: OverlayPosition,
    info: &VideoInfo,
) -> Result<PathBuf, ComposeError> {
    let process = runner
        .run_encoder(single_pass_args(source, bar, output, position, info))
        .await?;

    if !process.status.success() {
        return Err(ComposeError::SegmentCompositionFailed {
            index: 0,
            diagnostics: diagnostic_tail(&process.stderr, DIAGNOSTIC_TAIL_CHARS),
        });
    }

    info!(output = %output.display(), "single pass composition done");
    Ok(output.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::encoder::MockEncoderExecutor;
    use std::os::unix::process::ExitStatusExt;
    use std::process::{ExitStatus, Output};

    fn mock_output(stderr: &str, success: bool) -> std::io::Result<Output> {
        Ok(Output {
            status: if success {
                ExitStatus::from_raw(0)
            } else {
                ExitStatus::from_raw(1 << 8)
            },
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        })
    }

    fn test_info() -> VideoInfo {
        VideoInfo {
            width: 1280,
            height: 720,
            fps: 30.0,
            duration: 250.0,
            has_audio: true,
        }
    }

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    fn value_after(args: &[String], flag: &str) -> Option<String> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1).cloned())
    }

    #[test]
    fn test_stack_filter_positions() {
        assert_eq!(
            stack_filter(OverlayPosition::Top, 1280),
            "[1:v]scale=1280:-1[bar];[bar][0:v]vstack=inputs=2[out]"
        );
        assert_eq!(
            stack_filter(OverlayPosition::Bottom, 640),
            "[1:v]scale=640:-1[bar];[0:v][bar]vstack=inputs=2[out]"
        );
    }

    #[test]
    fn test_segment_args_window_and_gop() {
        let config = CompositionJobConfig::new(OverlayPosition::Bottom, 60.0, 2, 2).unwrap();
        let segment = Segment::new(4, 240.0, 10.0);
        let args = strings(&segment_args(
            Path::new("/in/source.mp4"),
            Path::new("/in/bar.mp4"),
            &segment,
            Path::new("/out/video.segment_0004.mp4"),
            &config,
            &test_info(),
        ));

        // both inputs are seeked to the same window
        let windows: Vec<&[String]> = args.windows(6).filter(|w| w[0] == "-ss").collect();
        assert_eq!(windows.len(), 2);
        for window in &windows {
            assert_eq!(window[1], "240");
            assert_eq!(window[2], "-t");
            assert_eq!(window[3], "10");
        }
        assert_eq!(windows[0][5], "/in/source.mp4");
        assert_eq!(windows[1][5], "/in/bar.mp4");

        assert_eq!(value_after(&args, "-g").as_deref(), Some("60"));
        assert_eq!(value_after(&args, "-keyint_min").as_deref(), Some("60"));
        assert_eq!(value_after(&args, "-sc_threshold").as_deref(), Some("0"));
        assert_eq!(value_after(&args, "-crf").as_deref(), Some("18"));
        assert_eq!(value_after(&args, "-preset").as_deref(), Some("fast"));
        assert_eq!(value_after(&args, "-c:v").as_deref(), Some("libx264"));
        assert_eq!(value_after(&args, "-reset_timestamps").as_deref(), Some("1"));
        assert_eq!(value_after(&args, "-fflags").as_deref(), Some("+genpts"));
        assert_eq!(value_after(&args, "-c:a").as_deref(), Some("aac"));
        assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "0:a"));
        assert_eq!(args.last().unwrap(), "/out/video.segment_0004.mp4");
    }

    #[test]
    fn test_single_pass_args_have_no_window() {
        let args = strings(&single_pass_args(
            Path::new("/in/source.mp4"),
            Path::new("/in/bar.mp4"),
            Path::new("/out/video.mp4"),
            OverlayPosition::Top,
            &test_info(),
        ));
        assert!(!args.iter().any(|a| a == "-ss" || a == "-g"));
        assert_eq!(
            value_after(&args, "-filter_complex").as_deref(),
            Some("[1:v]scale=1280:-1[bar];[bar][0:v]vstack=inputs=2[out]")
        );
        assert_eq!(args.last().unwrap(), "/out/video.mp4");
    }

    #[test]
    fn test_silent_source_gets_no_audio_track() {
        let info = VideoInfo {
            has_audio: false,
            ..test_info()
        };
        let config = CompositionJobConfig::new(OverlayPosition::Bottom, 60.0, 2, 2).unwrap();
        let args = strings(&segment_args(
            Path::new("/in/source.mp4"),
            Path::new("/in/bar.mp4"),
            &Segment::new(0, 0.0, 60.0),
            Path::new("/out/video.segment_0000.mp4"),
            &config,
            &info,
        ));
        assert!(args.iter().any(|a| a == "-an"));
        assert!(!args.iter().any(|a| a == "-c:a" || a.starts_with("0:a")));
        assert_eq!(value_after(&args, "-c:v").as_deref(), Some("libx264"));

        let args = strings(&single_pass_args(
            Path::new("/in/source.mp4"),
            Path::new("/in/bar.mp4"),
            Path::new("/out/video.mp4"),
            OverlayPosition::Top,
            &info,
        ));
        assert!(args.iter().any(|a| a == "-an"));
        assert!(!args.iter().any(|a| a == "-c:a"));
    }

    #[test]
    fn test_segment_output_path_is_deterministic() {
        let output = Path::new("/work/final.mp4");
        assert_eq!(
            segment_output_path(output, 3),
            PathBuf::from("/work/final.segment_0003.mp4")
        );
        assert_eq!(segment_output_path(output, 3), segment_output_path(output, 3));
        assert_ne!(segment_output_path(output, 3), segment_output_path(output, 4));
    }

    #[tokio::test]
    async fn test_compose_segment_success() {
        let mut runner = MockEncoderExecutor::new();
        runner
            .expect_run_encoder()
            .withf(|args| args.last().map(|a| a == "/out/v.segment_0001.mp4").unwrap_or(false))
            .times(1)
            .returning(|_| mock_output("", true));

        let config = CompositionJobConfig::new(OverlayPosition::Top, 60.0, 2, 1).unwrap();
        let result = compose_segment(
            &runner,
            Path::new("/in/s.mp4"),
            Path::new("/in/b.mp4"),
            &Segment::new(1, 60.0, 60.0),
            Path::new("/out/v.segment_0001.mp4"),
            &config,
            &test_info(),
        )
        .await;
        assert_eq!(result.unwrap(), PathBuf::from("/out/v.segment_0001.mp4"));
    }

    #[tokio::test]
    async fn test_compose_segment_failure_keeps_stderr_tail() {
        let mut runner = MockEncoderExecutor::new();
        let noisy = "frame=1 fps=0.0\n".repeat(200) + "Conversion failed!";
        runner
            .expect_run_encoder()
            .times(1)
            .returning(move |_| mock_output(&noisy, false));

        let config = CompositionJobConfig::new(OverlayPosition::Top, 60.0, 2, 1).unwrap();
        let err = compose_segment(
            &runner,
            Path::new("/in/s.mp4"),
            Path::new("/in/b.mp4"),
            &Segment::new(2, 120.0, 60.0),
            Path::new("/out/v.segment_0002.mp4"),
            &config,
            &test_info(),
        )
        .await
        .unwrap_err();

        match err {
            ComposeError::SegmentCompositionFailed { index, diagnostics } => {
                assert_eq!(index, 2);
                assert!(diagnostics.ends_with("Conversion failed!"));
                assert!(diagnostics.chars().count() <= DIAGNOSTIC_TAIL_CHARS);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_compose_segment_spawn_error() {
        let mut runner = MockEncoderExecutor::new();
        runner.expect_run_encoder().times(1).returning(|_| {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "ffmpeg not found"))
        });

        let config = CompositionJobConfig::new(OverlayPosition::Top, 60.0, 2, 1).unwrap();
        let result = compose_segment(
            &runner,
            Path::new("/in/s.mp4"),
            Path::new("/in/b.mp4"),
            &Segment::new(0, 0.0, 60.0),
            Path::new("/out/v.segment_0000.mp4"),
            &config,
            &test_info(),
        )
        .await;
        assert!(matches!(result, Err(ComposeError::Process(_))));
    }
}

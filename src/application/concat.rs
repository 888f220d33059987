use super::cleanup::release_artifacts;
use super::composer::{quality_args, DIAGNOSTIC_TAIL_CHARS};
use crate::error::{diagnostic_tail, ComposeError};
use crate::ports::encoder::EncoderExecutor;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

/// Manifest listing the segments of `output`, written next to it.
pub fn manifest_path_for(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output.with_file_name(format!("{}.segments.txt", stem))
}

/// Escapes single quotes for the concat demuxer's `file '...'` directive.
pub fn escape_manifest_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}

pub fn manifest_contents(segment_paths: &[PathBuf]) -> String {
    segment_paths
        .iter()
        .map(|path| format!("file '{}'\n", escape_manifest_path(path)))
        .collect()
}

fn concat_input(manifest: &Path) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        manifest.as_os_str().to_owned(),
    ]
}

pub fn stream_copy_args(manifest: &Path, output: &Path) -> Vec<OsString> {
    let mut args = concat_input(manifest);
    args.extend([OsString::from("-c"), OsString::from("copy")]);
    args.push(output.as_os_str().to_owned());
    args
}

pub fn reencode_args(manifest: &Path, output: &Path) -> Vec<OsString> {
    let mut args = concat_input(manifest);
    args.extend(quality_args());
    args.push(output.as_os_str().to_owned());
    args
}

/// Joins segment files in the given order into `output`.
///
/// The stream-copy join is tried first. If it cannot be started, exits
/// non-zero or leaves no output file, a full re-encode over the same manifest
/// decides the outcome. When that fails too the output path is released.
/// The manifest is left on disk for the caller to clean up.
pub async fn concat_segments(
    runner: &impl EncoderExecutor,
    segment_paths: &[PathBuf],
    output: &Path,
) -> Result<PathBuf, ComposeError> {
    if segment_paths.is_empty() {
        return Err(ComposeError::EmptyInput);
    }

    let manifest = manifest_path_for(output);
    fs::write(&manifest, manifest_contents(segment_paths)).await?;

    let copy_failure = match runner.run_encoder(stream_copy_args(&manifest, output)).await {
        Ok(copy) if copy.status.success() => {
            if fs::try_exists(output).await.unwrap_or(false) {
                info!(segments = segment_paths.len(), output = %output.display(), "stream copy join done");
                return Ok(output.to_path_buf());
            }
            "stream copy produced no output".to_string()
        }
        Ok(copy) => format!(
            "{}: {}",
            copy.status,
            diagnostic_tail(&copy.stderr, DIAGNOSTIC_TAIL_CHARS)
        ),
        Err(e) => format!("could not start encoder: {}", e),
    };
    warn!(diagnostics = %copy_failure, "stream copy join failed, re-encoding");

    let diagnostics = match runner.run_encoder(reencode_args(&manifest, output)).await {
        Ok(reencode) if reencode.status.success() => {
            info!(segments = segment_paths.len(), output = %output.display(), "re-encode join done");
            return Ok(output.to_path_buf());
        }
        Ok(reencode) => diagnostic_tail(&reencode.stderr, DIAGNOSTIC_TAIL_CHARS),
        Err(e) => format!("could not start encoder: {}", e),
    };

    release_artifacts(&[output.to_path_buf()]).await;
    Err(ComposeError::ConcatenationFailed(diagnostics))
}

use std::io;
use std::path::PathBuf;
use tracing::warn;

/// Best-effort release of intermediate files.
///
/// Missing files are skipped and any other deletion error is only logged:
/// cleanup never changes the outcome of the job that triggered it.
pub async fn release_artifacts(paths: &[PathBuf]) {
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "could not remove artifact"),
        }
    }
}

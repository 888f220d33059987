use super::cleanup::release_artifacts;
use super::composer::{compose_segment, compose_single_pass, segment_output_path};
use super::concat::{concat_segments, manifest_path_for};
use super::governor::{ComposeContext, SegmentGate};
use crate::domain::jobs::{CompositionJobConfig, JobProgress, JobStage};
use crate::domain::probe::VideoInfo;
use crate::domain::segments::calculate_segments;
use crate::error::ComposeError;
use crate::ports::encoder::EncoderExecutor;
use crate::ports::prober::MediaProber;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Drives one composition job from planning to cleanup.
pub struct ParallelComposer<E, P> {
    encoder: E,
    prober: P,
    context: ComposeContext,
}

fn lock<'a, T>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn ensure_exists(path: &Path) -> Result<(), ComposeError> {
    match tokio::fs::try_exists(path).await {
        Ok(true) => Ok(()),
        _ => Err(ComposeError::NotFound(path.to_path_buf())),
    }
}

/// Moves the job into its terminal stage and logs the outcome.
fn finish(progress: &mut JobProgress, result: &Result<PathBuf, ComposeError>) {
    match result {
        Ok(output) => {
            progress.stage = JobStage::Succeeded;
            info!(
                segments = progress.total_segments(),
                output = %output.display(),
                "job succeeded"
            );
        }
        Err(e) => {
            progress.fail(e);
            warn!(
                completed = progress.completed_segments,
                failed = progress.failed_segments,
                error = %e,
                "job failed"
            );
        }
    }
}

impl<E, P> ParallelComposer<E, P>
where
    E: EncoderExecutor,
    P: MediaProber,
{
    pub fn new(encoder: E, prober: P, context: ComposeContext) -> Self {
        Self {
            encoder,
            prober,
            context,
        }
    }

    pub fn context(&self) -> &ComposeContext {
        &self.context
    }

    /// Stacks `bar` onto `source` and writes the result to `output`.
    ///
    /// Holds a job-level permit for the whole run. Intermediate segment files
    /// and the manifest are removed on every exit path.
    pub async fn compose(
        &self,
        source: &Path,
        bar: &Path,
        output: &Path,
        config: &CompositionJobConfig,
    ) -> Result<PathBuf, ComposeError> {
        let job_id = Uuid::new_v4().to_string();
        let span = info_span!("compose_job", job_id = %job_id);
        self.run_job(job_id, source, bar, output, config)
            .instrument(span)
            .await
    }

    async fn run_job(
        &self,
        job_id: String,
        source: &Path,
        bar: &Path,
        output: &Path,
        config: &CompositionJobConfig,
    ) -> Result<PathBuf, ComposeError> {
        ensure_exists(source).await?;
        ensure_exists(bar).await?;

        let _job_permit = self.context.admit_job().await?;
        info!(source = %source.display(), output = %output.display(), "job admitted");

        let info = self.prober.probe(source).await?;
        info!(
            width = info.width,
            height = info.height,
            fps = info.fps,
            duration = info.duration,
            has_audio = info.has_audio,
            "probed"
        );
        if !(info.duration > 0.0) || !info.duration.is_finite() {
            return Err(ComposeError::InvalidMedia(format!(
                "unusable duration {} for {}",
                info.duration,
                source.display()
            )));
        }

        let mut progress = JobProgress::new(job_id);
        progress.segments = calculate_segments(info.duration, config.chunk_seconds())?;
        info!(
            segments = progress.total_segments(),
            chunk_seconds = config.chunk_seconds(),
            "planned"
        );

        let result = if progress.total_segments() == 1 {
            progress.stage = JobStage::Composing;
            progress.mark_running(0);
            let result =
                compose_single_pass(&self.encoder, source, bar, output, config.position(), &info)
                    .await;
            if result.is_err() {
                release_artifacts(&[output.to_path_buf()]).await;
            }
            progress.settle(0, result.as_ref().cloned().map_err(|e| e.to_string()));
            result
        } else {
            let result = self
                .compose_and_join(&mut progress, source, bar, output, config, &info)
                .await;

            let mut artifacts: Vec<PathBuf> = (0..progress.total_segments())
                .map(|index| segment_output_path(output, index))
                .collect();
            artifacts.push(manifest_path_for(output));
            release_artifacts(&artifacts).await;
            result
        };

        finish(&mut progress, &result);
        result
    }

    async fn compose_and_join(
        &self,
        progress: &mut JobProgress,
        source: &Path,
        bar: &Path,
        output: &Path,
        config: &CompositionJobConfig,
        info: &VideoInfo,
    ) -> Result<PathBuf, ComposeError> {
        progress.stage = JobStage::Composing;
        let gate = SegmentGate::new(config.max_workers())?;
        let planned = progress.segments.clone();
        let total = planned.len();

        // join_all yields outcomes in input order, so slot i belongs to segment i
        // whatever order the encodes finish in
        let outcomes = {
            let tracker = Mutex::new(&mut *progress);
            join_all(planned.iter().map(|segment| {
                let gate = &gate;
                let tracker = &tracker;
                async move {
                    let _permit = gate.admit().await?;
                    lock(tracker).mark_running(segment.index);
                    let artifact = segment_output_path(output, segment.index);
                    compose_segment(&self.encoder, source, bar, segment, &artifact, config, info)
                        .await
                }
            }))
            .await
        };

        for (index, outcome) in outcomes.into_iter().enumerate() {
            if let Err(e) = &outcome {
                warn!(segment = index, error = %e, "segment failed");
            }
            progress.settle(index, outcome.map_err(|e| e.to_string()));
        }

        if !progress.all_done() {
            return Err(ComposeError::PartialFailure {
                succeeded: progress.completed_segments,
                total,
            });
        }

        progress.stage = JobStage::Concatenating;
        concat_segments(&self.encoder, &progress.done_artifacts(), output).await
    }
}

//! Two-level admission control.
//!
//! - Job gate: process-wide, bounds concurrently running composition jobs.
//!   Created once at startup through [`ComposeContext::start`] and shared by clone.
//! - Segment gate: per job, bounds concurrently running segment encodes.
//!
//! Permits are released when dropped.

use crate::error::ComposeError;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::info;

/// Process-wide composition context owning the job-level gate.
#[derive(Clone, Debug)]
pub struct ComposeContext {
    job_gate: Arc<Semaphore>,
    capacity: usize,
}

/// Held for the whole lifetime of one job.
#[derive(Debug)]
pub struct JobPermit {
    _permit: OwnedSemaphorePermit,
}

impl ComposeContext {
    pub fn start(max_active_jobs: usize) -> Result<Self, ComposeError> {
        if max_active_jobs == 0 {
            return Err(ComposeError::InvalidArgument(
                "max_active_jobs must be positive, got 0".to_string(),
            ));
        }
        info!(max_active_jobs, "composition context started");
        Ok(Self {
            job_gate: Arc::new(Semaphore::new(max_active_jobs)),
            capacity: max_active_jobs,
        })
    }

    /// Waits until a job slot is free. Fails once the context is shut down.
    pub async fn admit_job(&self) -> Result<JobPermit, ComposeError> {
        let permit = self
            .job_gate
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ComposeError::Unavailable)?;
        Ok(JobPermit { _permit: permit })
    }

    /// Stops admitting new jobs. Jobs already holding a permit run to completion.
    pub fn shutdown(&self) {
        self.job_gate.close();
        info!("composition context shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.job_gate.is_closed()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn active_jobs(&self) -> usize {
        self.capacity - self.job_gate.available_permits()
    }
}

/// Per-job bound on concurrently running segment encodes.
#[derive(Clone, Debug)]
pub struct SegmentGate {
    permits: Arc<Semaphore>,
}

#[derive(Debug)]
pub struct SegmentPermit {
    _permit: OwnedSemaphorePermit,
}

impl SegmentGate {
    pub fn new(max_workers: usize) -> Result<Self, ComposeError> {
        if max_workers == 0 {
            return Err(ComposeError::InvalidArgument(
                "max_workers must be positive, got 0".to_string(),
            ));
        }
        Ok(Self {
            permits: Arc::new(Semaphore::new(max_workers)),
        })
    }

    pub async fn admit(&self) -> Result<SegmentPermit, ComposeError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ComposeError::Unavailable)?;
        Ok(SegmentPermit { _permit: permit })
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

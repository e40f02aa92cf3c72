//! In-process job event bus backed by a `tokio::sync::broadcast` channel.
//!
//! Every job state change is published here. The HTTP layer subscribes to
//! wait for a submitted job to finish; the store stays authoritative, so a
//! receiver that lags simply re-reads the job.

use std::time::Duration;

use chrono::{DateTime, Utc};
use goldrush_core::error::CoreError;
use goldrush_core::job::{Job, JobState};
use goldrush_core::store::JobStore;
use goldrush_core::types::DbId;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub job_id: DbId,
    pub account_id: DbId,
    pub state: JobState,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id,
            account_id: job.account_id,
            state: job.state,
            timestamp: job.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// JobEventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

pub struct JobEventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl JobEventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest events are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Dropped silently when nobody is subscribed.
    pub fn publish(&self, event: JobEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    /// Wait until `job_id` reaches a terminal state or `wait` elapses.
    ///
    /// Returns the latest stored job either way; callers check
    /// [`JobState::is_terminal`] to tell the two apart.
    pub async fn await_terminal(
        &self,
        jobs: &dyn JobStore,
        job_id: DbId,
        wait: Duration,
    ) -> Result<Job, CoreError> {
        // Subscribe before the first read so no transition slips between them.
        let mut rx = self.subscribe();
        let deadline = tokio::time::Instant::now() + wait;

        let job = load(jobs, job_id).await?;
        if job.state.is_terminal() {
            return Ok(job);
        }

        loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Ok(event)) if event.job_id == job_id && event.state.is_terminal() => {
                    return load(jobs, job_id).await;
                }
                Ok(Ok(_)) => {}
                Ok(Err(RecvError::Lagged(skipped))) => {
                    tracing::debug!(job_id, skipped, "Job event receiver lagged");
                    let job = load(jobs, job_id).await?;
                    if job.state.is_terminal() {
                        return Ok(job);
                    }
                }
                Ok(Err(RecvError::Closed)) | Err(_) => return load(jobs, job_id).await,
            }
        }
    }
}

async fn load(jobs: &dyn JobStore, job_id: DbId) -> Result<Job, CoreError> {
    jobs.get(job_id)
        .await?
        .ok_or(CoreError::NotFound { entity: "Job", id: job_id })
}

impl Default for JobEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

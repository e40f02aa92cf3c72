use std::sync::Arc;
use std::time::Duration;

use goldrush_core::backoff::RetryPolicy;
use goldrush_core::error::CoreError;
use goldrush_core::job::{
    Job, JobState, JobTransition, REASON_PROVIDER_TIMEOUT, REASON_RESERVATION_EXPIRED,
};
use goldrush_core::ledger::{Ledger, ReservationState};
use goldrush_core::store::JobStore;
use goldrush_core::types::DbId;
use goldrush_engine::{Dispatcher, Engine, EngineConfig, JobEvent, JobEventBus};
use goldrush_provider::{GenerationOutput, GenerationProvider, ProviderError};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// How the last provider attempt of a job went wrong.
enum AttemptFailure {
    Timeout,
    Provider(ProviderError),
}

impl AttemptFailure {
    fn is_retryable(&self) -> bool {
        match self {
            AttemptFailure::Timeout => true,
            AttemptFailure::Provider(e) => e.is_transient(),
        }
    }

    fn reason(&self) -> String {
        match self {
            AttemptFailure::Timeout => REASON_PROVIDER_TIMEOUT.to_string(),
            AttemptFailure::Provider(e) => format!("ProviderError: {e}"),
        }
    }
}

struct Worker {
    jobs: Arc<dyn JobStore>,
    ledger: Arc<dyn Ledger>,
    dispatcher: Arc<Dispatcher>,
    events: Arc<JobEventBus>,
    provider: Arc<dyn GenerationProvider>,
    timeout: Duration,
    retry: RetryPolicy,
}

/// Fixed-size pool of job executors.
pub struct WorkerPool {
    worker: Arc<Worker>,
    size: usize,
}

impl WorkerPool {
    pub fn new(engine: &Engine, provider: Arc<dyn GenerationProvider>, config: &EngineConfig) -> Self {
        Self {
            worker: Arc::new(Worker {
                jobs: Arc::clone(&engine.stores.jobs),
                ledger: Arc::clone(&engine.stores.ledger),
                dispatcher: Arc::clone(&engine.dispatcher),
                events: Arc::clone(&engine.events),
                provider,
                timeout: config.provider_timeout,
                retry: config.retry.clone(),
            }),
            size: config.worker_count.max(1),
        }
    }

    /// Run every worker until `cancel` fires. A job already running when the
    /// token fires is finished before its worker exits.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(workers = self.size, "Worker pool started");

        let mut set = JoinSet::new();
        for worker_id in 0..self.size {
            let worker = Arc::clone(&self.worker);
            let cancel = cancel.clone();
            set.spawn(async move { worker.run(worker_id, cancel).await });
        }

        while let Some(result) = set.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Worker task panicked");
            }
        }
        tracing::info!("Worker pool stopped");
    }
}

impl Worker {
    async fn run(&self, worker_id: usize, cancel: CancellationToken) {
        while let Some(job_id) = self.dispatcher.next(&cancel).await {
            self.process(worker_id, job_id).await;
        }
    }

    async fn process(&self, worker_id: usize, job_id: DbId) {
        let job = match self
            .jobs
            .update_state(job_id, JobState::Queued, JobTransition::to(JobState::Running))
            .await
        {
            Ok(job) => job,
            Err(CoreError::StateMismatch { actual, .. }) => {
                tracing::debug!(job_id, state = %actual, "Skipping job no longer queued");
                return;
            }
            Err(e) => {
                tracing::error!(job_id, error = %e, "Failed to claim job");
                return;
            }
        };
        self.events.publish(JobEvent::from_job(&job));

        if !self.hold_is_live(&job).await {
            let transition = JobTransition::failed(REASON_RESERVATION_EXPIRED, 0);
            if let Some(done) = self.finish(&job, transition).await {
                self.events.publish(JobEvent::from_job(&done));
                tracing::warn!(job_id, "Job failed, reservation expired before it ran");
            }
            return;
        }
        tracing::info!(job_id, worker_id, kind = %job.kind, "Job started");

        match self.execute(&job).await {
            Ok((output, attempts)) => {
                let transition = JobTransition::succeeded(output.to_json(), attempts);
                if let Some(done) = self.finish(&job, transition).await {
                    self.settle(&done, true).await;
                    self.events.publish(JobEvent::from_job(&done));
                    tracing::info!(job_id, attempts, "Job succeeded");
                }
            }
            Err((failure, attempts)) => {
                let reason = failure.reason();
                let transition = JobTransition::failed(reason.clone(), attempts);
                if let Some(done) = self.finish(&job, transition).await {
                    self.settle(&done, false).await;
                    self.events.publish(JobEvent::from_job(&done));
                    tracing::warn!(job_id, attempts, reason = %reason, "Job failed");
                }
            }
        }
    }

    /// Whether the claimed job's reservation is still HELD. A lookup error
    /// does not stop the job; its settlement reports any problem later.
    async fn hold_is_live(&self, job: &Job) -> bool {
        match self.ledger.reservation(job.reservation_id).await {
            Ok(Some(r)) if r.state == ReservationState::Held => true,
            Ok(current) => {
                tracing::warn!(
                    job_id = job.id,
                    reservation_id = %job.reservation_id,
                    reservation_state = ?current.map(|r| r.state),
                    "Reservation no longer held",
                );
                false
            }
            Err(e) => {
                tracing::error!(job_id = job.id, error = %e, "Failed to load reservation");
                true
            }
        }
    }

    /// Call the provider until it succeeds, fails permanently, or the retry
    /// budget runs out. Returns the attempt count alongside the outcome.
    async fn execute(&self, job: &Job) -> Result<(GenerationOutput, i32), (AttemptFailure, i32)> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let call = self.provider.generate(job.kind, &job.payload);
            let failure = match tokio::time::timeout(self.timeout, call).await {
                Ok(Ok(output)) => return Ok((output, attempt as i32)),
                Ok(Err(e)) => AttemptFailure::Provider(e),
                Err(_) => AttemptFailure::Timeout,
            };

            if !failure.is_retryable() || !self.retry.has_attempts_left(attempt) {
                return Err((failure, attempt as i32));
            }

            let delay = self.retry.delay_after(attempt);
            tracing::warn!(
                job_id = job.id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                reason = %failure.reason(),
                "Provider attempt failed, retrying",
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Move a RUNNING job to its terminal state. The terminal event is
    /// published by the caller once the reservation is settled.
    async fn finish(&self, job: &Job, transition: JobTransition) -> Option<Job> {
        match self
            .jobs
            .update_state(job.id, JobState::Running, transition)
            .await
        {
            Ok(done) => Some(done),
            Err(e) => {
                tracing::error!(job_id = job.id, error = %e, "Failed to finalize job");
                None
            }
        }
    }

    /// Commit the reservation of a succeeded job or release a failed one's.
    async fn settle(&self, job: &Job, succeeded: bool) {
        let result = if succeeded {
            self.ledger.commit(job.reservation_id).await
        } else {
            self.ledger.release(job.reservation_id).await
        };

        match result {
            Ok(_) => {}
            Err(e @ CoreError::ReservationSettled { .. }) if succeeded => {
                // The hold expired and was swept while the job ran; the
                // result stands but was not charged.
                tracing::error!(
                    job_id = job.id,
                    reservation_id = %job.reservation_id,
                    error = %e,
                    "Reservation settled before commit",
                );
            }
            Err(e) => {
                tracing::warn!(
                    job_id = job.id,
                    reservation_id = %job.reservation_id,
                    error = %e,
                    "Failed to settle reservation",
                );
            }
        }
    }
}

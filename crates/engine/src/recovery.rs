//! Startup recovery for durable backends.
//!
//! The queue lives in memory, so after a restart the job table is the only
//! record of pending work. QUEUED jobs go back into the dispatcher in their
//! original order. RUNNING jobs lost their worker with the old process; they
//! are failed with `WorkerLost` and their reservations released.

use goldrush_core::error::CoreError;
use goldrush_core::job::{JobState, JobTransition, REASON_WORKER_LOST};

use crate::dispatcher::Dispatcher;
use crate::events::{JobEvent, JobEventBus};
use crate::stores::Stores;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    pub requeued: usize,
    pub failed: usize,
    /// QUEUED jobs that did not fit into the queue.
    pub left_queued: usize,
}

pub async fn recover(
    stores: &Stores,
    dispatcher: &Dispatcher,
    events: &JobEventBus,
) -> Result<RecoveryReport, CoreError> {
    let mut report = RecoveryReport::default();

    for job in stores.jobs.list_by_state(JobState::Running).await? {
        let transition = JobTransition::failed(REASON_WORKER_LOST, job.attempts);
        let failed = match stores
            .jobs
            .update_state(job.id, JobState::Running, transition)
            .await
        {
            Ok(failed) => failed,
            Err(CoreError::StateMismatch { .. }) => continue,
            Err(e) => return Err(e),
        };

        if let Err(e) = stores.ledger.release(failed.reservation_id).await {
            tracing::warn!(job_id = failed.id, error = %e, "Could not release reservation of lost job");
        }
        events.publish(JobEvent::from_job(&failed));
        report.failed += 1;
    }

    let queued = stores.jobs.list_by_state(JobState::Queued).await?;
    let total = queued.len();
    for job in queued {
        match dispatcher.enqueue(job.id, job.priority).await {
            Ok(()) => report.requeued += 1,
            Err(CoreError::QueueFull { capacity }) => {
                report.left_queued = total - report.requeued;
                tracing::warn!(
                    capacity,
                    left_queued = report.left_queued,
                    "Queue filled during recovery; remaining jobs stay QUEUED",
                );
                break;
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        requeued = report.requeued,
        failed = report.failed,
        left_queued = report.left_queued,
        "Startup recovery complete",
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use goldrush_core::generation::GenerationKind;
    use goldrush_core::job::NewJob;
    use goldrush_core::ledger::ReservationState;

    use super::*;

    async fn seed_job(stores: &Stores, priority: i32) -> goldrush_core::job::Job {
        let reservation = stores
            .ledger
            .reserve(1, 10, chrono::Duration::minutes(15))
            .await
            .unwrap();
        stores
            .jobs
            .create(NewJob {
                account_id: 1,
                kind: GenerationKind::Text,
                payload: serde_json::json!({ "prompt": "p", "model": "m" }),
                cost: 10,
                priority,
                reservation_id: reservation.id,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn requeues_queued_and_fails_running() {
        let stores = Stores::in_memory();
        stores.ledger.open_account(1, 100).await.unwrap();

        let queued = seed_job(&stores, 0).await;
        let running = seed_job(&stores, 0).await;
        stores
            .jobs
            .update_state(running.id, JobState::Queued, JobTransition::to(JobState::Running))
            .await
            .unwrap();

        let dispatcher = Dispatcher::new(10);
        let report = recover(&stores, &dispatcher, &JobEventBus::default())
            .await
            .unwrap();

        assert_eq!(report, RecoveryReport { requeued: 1, failed: 1, left_queued: 0 });
        assert_eq!(dispatcher.dequeue_next().await, Some(queued.id));

        let lost = stores.jobs.get(running.id).await.unwrap().unwrap();
        assert_eq!(lost.state, JobState::Failed);
        assert_eq!(lost.failure_reason.as_deref(), Some(REASON_WORKER_LOST));

        let reservation = stores.ledger.reservation(running.reservation_id).await.unwrap().unwrap();
        assert_eq!(reservation.state, ReservationState::Released);
        assert_eq!(stores.ledger.balance(1).await.unwrap().unwrap().balance, 90);
    }

    #[tokio::test]
    async fn overflow_stays_queued() {
        let stores = Stores::in_memory();
        stores.ledger.open_account(1, 100).await.unwrap();
        for _ in 0..3 {
            seed_job(&stores, 0).await;
        }

        let dispatcher = Dispatcher::new(2);
        let report = recover(&stores, &dispatcher, &JobEventBus::default())
            .await
            .unwrap();

        assert_eq!(report, RecoveryReport { requeued: 2, failed: 0, left_queued: 1 });
        assert_eq!(stores.jobs.list_by_state(JobState::Queued).await.unwrap().len(), 3);
    }
}

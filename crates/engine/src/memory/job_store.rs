//! In-memory job store. Each job sits behind its own mutex so state
//! transitions on different jobs never contend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use goldrush_core::error::CoreError;
use goldrush_core::job::{validate_transition, Job, JobState, JobTransition, NewJob};
use goldrush_core::store::{JobStore, Page};
use goldrush_core::types::DbId;
use tokio::sync::{Mutex, RwLock};

pub struct MemoryJobStore {
    next_id: AtomicI64,
    jobs: RwLock<HashMap<DbId, Arc<Mutex<Job>>>>,
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            jobs: RwLock::new(HashMap::new()),
        }
    }
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot every job matching `filter`.
    async fn collect(&self, filter: impl Fn(&Job) -> bool) -> Vec<Job> {
        let slots: Vec<_> = self.jobs.read().await.values().cloned().collect();
        let mut out = Vec::new();
        for slot in slots {
            let job = slot.lock().await;
            if filter(&job) {
                out.push(job.clone());
            }
        }
        out
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, input: NewJob) -> Result<Job, CoreError> {
        let now = Utc::now();
        let job = Job {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            account_id: input.account_id,
            kind: input.kind,
            payload: input.payload,
            cost: input.cost,
            priority: input.priority,
            reservation_id: input.reservation_id,
            state: JobState::Queued,
            attempts: 0,
            result: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        };
        self.jobs
            .write()
            .await
            .insert(job.id, Arc::new(Mutex::new(job.clone())));
        Ok(job)
    }

    async fn get(&self, id: DbId) -> Result<Option<Job>, CoreError> {
        let Some(slot) = self.jobs.read().await.get(&id).cloned() else {
            return Ok(None);
        };
        let job = slot.lock().await.clone();
        Ok(Some(job))
    }

    async fn update_state(
        &self,
        id: DbId,
        expected: JobState,
        transition: JobTransition,
    ) -> Result<Job, CoreError> {
        validate_transition(expected, transition.to)?;

        let slot = self
            .jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(CoreError::NotFound { entity: "Job", id })?;

        let mut job = slot.lock().await;
        if job.state != expected {
            return Err(CoreError::StateMismatch {
                job_id: id,
                expected,
                actual: job.state,
            });
        }
        transition.apply(&mut job, Utc::now());
        Ok(job.clone())
    }

    async fn count_in_flight(&self, account_id: DbId) -> Result<i64, CoreError> {
        let jobs = self
            .collect(|j| j.account_id == account_id && j.state.is_in_flight())
            .await;
        Ok(jobs.len() as i64)
    }

    async fn list_by_account(&self, account_id: DbId, page: Page) -> Result<Vec<Job>, CoreError> {
        let mut jobs = self.collect(|j| j.account_id == account_id).await;
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(jobs
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn list_by_state(&self, state: JobState) -> Result<Vec<Job>, CoreError> {
        let mut jobs = self.collect(|j| j.state == state).await;
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(jobs)
    }

    async fn list_by_account_in_state(
        &self,
        account_id: DbId,
        state: JobState,
    ) -> Result<Vec<Job>, CoreError> {
        let mut jobs = self
            .collect(|j| j.account_id == account_id && j.state == state)
            .await;
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use goldrush_core::generation::GenerationKind;
    use uuid::Uuid;

    use super::*;

    fn new_job(account_id: DbId) -> NewJob {
        NewJob {
            account_id,
            kind: GenerationKind::Text,
            payload: serde_json::json!({ "prompt": "hi", "model": "m" }),
            cost: 10,
            priority: 0,
            reservation_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn created_jobs_start_queued_with_fresh_ids() {
        let store = MemoryJobStore::new();
        let a = store.create(new_job(1)).await.unwrap();
        let b = store.create(new_job(1)).await.unwrap();
        assert_eq!(a.state, JobState::Queued);
        assert_ne!(a.id, b.id);
        assert_eq!(store.get(a.id).await.unwrap(), Some(a));
    }

    #[tokio::test]
    async fn cas_succeeds_when_expected_state_matches() {
        let store = MemoryJobStore::new();
        let job = store.create(new_job(1)).await.unwrap();
        let running = store
            .update_state(job.id, JobState::Queued, JobTransition::to(JobState::Running))
            .await
            .unwrap();
        assert_eq!(running.state, JobState::Running);
    }

    #[tokio::test]
    async fn cas_with_stale_expectation_leaves_state_unchanged() {
        let store = MemoryJobStore::new();
        let job = store.create(new_job(1)).await.unwrap();
        store
            .update_state(job.id, JobState::Queued, JobTransition::to(JobState::Cancelled))
            .await
            .unwrap();

        let err = store
            .update_state(job.id, JobState::Queued, JobTransition::to(JobState::Running))
            .await
            .unwrap_err();
        assert_matches!(
            err,
            CoreError::StateMismatch { expected: JobState::Queued, actual: JobState::Cancelled, .. }
        );
        assert_eq!(store.get(job.id).await.unwrap().unwrap().state, JobState::Cancelled);
    }

    #[tokio::test]
    async fn disallowed_transition_is_rejected_before_lookup() {
        let store = MemoryJobStore::new();
        let job = store.create(new_job(1)).await.unwrap();
        let err = store
            .update_state(job.id, JobState::Queued, JobTransition::to(JobState::Succeeded))
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::InvalidTransition { .. });
        assert_eq!(store.get(job.id).await.unwrap().unwrap().state, JobState::Queued);
    }

    #[tokio::test]
    async fn only_one_of_two_racing_workers_claims_a_job() {
        let store = Arc::new(MemoryJobStore::new());
        let job = store.create(new_job(1)).await.unwrap();

        let a = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .update_state(job.id, JobState::Queued, JobTransition::to(JobState::Running))
                    .await
            })
        };
        let b = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .update_state(job.id, JobState::Queued, JobTransition::to(JobState::Running))
                    .await
            })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let store = MemoryJobStore::new();
        let err = store
            .update_state(99, JobState::Queued, JobTransition::to(JobState::Running))
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::NotFound { entity: "Job", id: 99 });
    }

    #[tokio::test]
    async fn in_flight_counts_queued_and_running_only() {
        let store = MemoryJobStore::new();
        let a = store.create(new_job(1)).await.unwrap();
        let b = store.create(new_job(1)).await.unwrap();
        store.create(new_job(2)).await.unwrap();
        store
            .update_state(a.id, JobState::Queued, JobTransition::to(JobState::Running))
            .await
            .unwrap();
        store
            .update_state(b.id, JobState::Queued, JobTransition::to(JobState::Cancelled))
            .await
            .unwrap();

        assert_eq!(store.count_in_flight(1).await.unwrap(), 1);
        assert_eq!(store.count_in_flight(2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn listing_pages_newest_first() {
        let store = MemoryJobStore::new();
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(store.create(new_job(1)).await.unwrap().id);
        }

        let page = store.list_by_account(1, Page::new(Some(2), Some(1))).await.unwrap();
        let got: Vec<_> = page.iter().map(|j| j.id).collect();
        assert_eq!(got, vec![ids[3], ids[2]]);

        let queued = store.list_by_state(JobState::Queued).await.unwrap();
        assert_eq!(queued.first().map(|j| j.id), Some(ids[0]));
    }
}

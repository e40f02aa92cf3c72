//! Admission: turn a validated generation request into a paid-for, queued
//! job in one step, and cancel queued jobs.
//!
//! Submit order:
//!
//! 1. validate the payload for its kind
//! 2. look up the account's plan and the price of the kind
//! 3. take the per-account admission lock
//! 4. check in-flight jobs against the plan's concurrency cap
//! 5. reserve a queue slot (no credits touched on `QueueFull`)
//! 6. reserve credits on the ledger
//! 7. write the QUEUED job and push it into the slot
//!
//! Any failure after step 6 releases the reservation before returning.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use goldrush_core::context::RequestContext;
use goldrush_core::error::CoreError;
use goldrush_core::generation::{validate_payload, GenerationKind};
use goldrush_core::job::{Job, JobState, JobTransition, NewJob};
use goldrush_core::types::DbId;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::dispatcher::Dispatcher;
use crate::events::{JobEvent, JobEventBus};
use crate::plans::PlanService;
use crate::stores::Stores;

/// One async mutex per account, created on first use and dropped once no
/// submission holds or waits on it.
#[derive(Default)]
struct AccountLocks {
    locks: StdMutex<HashMap<DbId, Arc<Mutex<()>>>>,
}

impl AccountLocks {
    fn map(&self) -> MutexGuard<'_, HashMap<DbId, Arc<Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn lock(&self, account_id: DbId) -> AccountGuard<'_> {
        let lock = Arc::clone(self.map().entry(account_id).or_default());
        let guard = lock.lock_owned().await;
        AccountGuard {
            locks: self,
            account_id,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.map().len()
    }
}

/// Holds one account's admission lock; prunes the map entry on drop when
/// nobody else references it.
struct AccountGuard<'a> {
    locks: &'a AccountLocks,
    account_id: DbId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for AccountGuard<'_> {
    fn drop(&mut self) {
        // Clones are only taken under the map lock, so a count of one here
        // means no other submission is waiting.
        let mut map = self.locks.map();
        self.guard.take();
        if map
            .get(&self.account_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.account_id);
        }
    }
}

pub struct AdmissionController {
    stores: Stores,
    plans: Arc<PlanService>,
    dispatcher: Arc<Dispatcher>,
    events: Arc<JobEventBus>,
    reservation_hold: chrono::Duration,
    locks: AccountLocks,
}

impl AdmissionController {
    pub fn new(
        stores: Stores,
        plans: Arc<PlanService>,
        dispatcher: Arc<Dispatcher>,
        events: Arc<JobEventBus>,
        reservation_hold: chrono::Duration,
    ) -> Self {
        Self {
            stores,
            plans,
            dispatcher,
            events,
            reservation_hold,
            locks: AccountLocks::default(),
        }
    }

    /// Admit a generation request.
    ///
    /// Fails with `InvalidPayload`, `PlanLimitExceeded`, `QueueFull` or
    /// `InsufficientBalance`; on failure no job exists and no gold is held.
    pub async fn submit(
        &self,
        ctx: &RequestContext,
        kind: GenerationKind,
        payload: serde_json::Value,
    ) -> Result<Job, CoreError> {
        validate_payload(kind, &payload)?;

        let account = self
            .stores
            .accounts
            .find_by_id(ctx.account_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Account",
                id: ctx.account_id,
            })?;
        if !account.is_active {
            return Err(CoreError::Forbidden("Account is disabled".into()));
        }

        let plan = self.plans.plan(account.plan)?;
        let cost = self.plans.cost(account.plan, kind)?;

        let _guard = self.locks.lock(account.id).await;

        let in_flight = self.stores.jobs.count_in_flight(account.id).await?;
        if in_flight >= i64::from(plan.max_concurrent_jobs) {
            return Err(CoreError::PlanLimitExceeded {
                limit: plan.max_concurrent_jobs,
            });
        }

        let slot = self.dispatcher.reserve_slot().await?;

        let reservation = self
            .stores
            .ledger
            .reserve(account.id, cost, self.reservation_hold)
            .await?;

        let job = match self
            .stores
            .jobs
            .create(NewJob {
                account_id: account.id,
                kind,
                payload,
                cost,
                priority: plan.priority,
                reservation_id: reservation.id,
            })
            .await
        {
            Ok(job) => job,
            Err(e) => {
                self.release_reservation(reservation.id).await;
                return Err(e);
            }
        };

        slot.push(job.id, job.priority).await;
        self.events.publish(JobEvent::from_job(&job));

        tracing::info!(
            job_id = job.id,
            account_id = account.id,
            kind = %kind,
            cost,
            reservation_id = %reservation.id,
            request_id = ctx.request_id.as_deref().unwrap_or("-"),
            "Job admitted",
        );
        Ok(job)
    }

    /// Cancel a QUEUED job owned by the caller and refund its reservation.
    pub async fn cancel(&self, ctx: &RequestContext, job_id: DbId) -> Result<Job, CoreError> {
        let job = self
            .stores
            .jobs
            .get(job_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Job",
                id: job_id,
            })?;

        if job.account_id != ctx.account_id {
            return Err(CoreError::Forbidden(
                "Job belongs to another account".into(),
            ));
        }
        if job.state != JobState::Queued {
            return Err(not_cancellable(job_id, job.state));
        }

        let cancelled = match self
            .stores
            .jobs
            .update_state(job_id, JobState::Queued, JobTransition::to(JobState::Cancelled))
            .await
        {
            Ok(job) => job,
            Err(CoreError::StateMismatch { actual, .. }) => {
                return Err(not_cancellable(job_id, actual))
            }
            Err(e) => return Err(e),
        };

        self.dispatcher.remove(job_id).await;
        self.release_reservation(cancelled.reservation_id).await;
        self.events.publish(JobEvent::from_job(&cancelled));

        tracing::info!(
            job_id,
            account_id = ctx.account_id,
            request_id = ctx.request_id.as_deref().unwrap_or("-"),
            "Job cancelled",
        );
        Ok(cancelled)
    }

    /// Release a reservation, logging instead of failing. A reservation that
    /// the sweeper already released is not an error here.
    async fn release_reservation(&self, reservation_id: Uuid) {
        match self.stores.ledger.release(reservation_id).await {
            Ok(_) => {}
            Err(e @ CoreError::ReservationSettled { .. }) => {
                tracing::warn!(reservation_id = %reservation_id, error = %e, "Reservation already settled");
            }
            Err(e) => {
                tracing::error!(reservation_id = %reservation_id, error = %e, "Failed to release reservation");
            }
        }
    }
}

fn not_cancellable(job_id: DbId, state: JobState) -> CoreError {
    CoreError::Conflict(format!(
        "Job {job_id} is {state}; only QUEUED jobs can be cancelled"
    ))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use goldrush_core::plan::PlanTier;
    use goldrush_core::store::NewAccount;
    use goldrush_core::types::Gold;
    use serde_json::json;

    use super::*;

    struct Harness {
        stores: Stores,
        dispatcher: Arc<Dispatcher>,
        admission: Arc<AdmissionController>,
    }

    fn harness(queue_capacity: usize) -> Harness {
        let stores = Stores::in_memory();
        let dispatcher = Arc::new(Dispatcher::new(queue_capacity));
        let admission = Arc::new(AdmissionController::new(
            stores.clone(),
            Arc::new(PlanService::default()),
            Arc::clone(&dispatcher),
            Arc::new(JobEventBus::default()),
            chrono::Duration::minutes(15),
        ));
        Harness {
            stores,
            dispatcher,
            admission,
        }
    }

    async fn account(h: &Harness, plan: PlanTier, balance: Gold) -> RequestContext {
        let account = h
            .stores
            .accounts
            .create(NewAccount {
                email: format!("{}@example.com", Uuid::new_v4()),
                name: "Test".into(),
                password_hash: "hash".into(),
                plan,
            })
            .await
            .unwrap();
        h.stores.ledger.open_account(account.id, balance).await.unwrap();
        RequestContext::new(account.id)
    }

    async fn balance(h: &Harness, ctx: &RequestContext) -> Gold {
        h.stores.ledger.balance(ctx.account_id).await.unwrap().unwrap().balance
    }

    fn text() -> serde_json::Value {
        json!({ "prompt": "write a poem", "model": "gpt-4" })
    }

    #[tokio::test]
    async fn exact_balance_then_insufficient() {
        let h = harness(10);
        let ctx = account(&h, PlanTier::Pro, 10).await;

        let job = h.admission.submit(&ctx, GenerationKind::Text, text()).await.unwrap();
        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.cost, 10);
        assert_eq!(balance(&h, &ctx).await, 0);

        let err = h
            .admission
            .submit(&ctx, GenerationKind::Text, text())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::InsufficientBalance { required: 10, available: 0 });
        assert_eq!(h.dispatcher.depth().await, 1);
    }

    #[tokio::test]
    async fn invalid_payload_touches_nothing() {
        let h = harness(10);
        let ctx = account(&h, PlanTier::Free, 50).await;

        let err = h
            .admission
            .submit(&ctx, GenerationKind::Video, json!({ "prompt": "x", "duration": 0 }))
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::InvalidPayload(_));
        assert_eq!(balance(&h, &ctx).await, 50);
        assert_eq!(h.stores.jobs.count_in_flight(ctx.account_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrency_cap_rejects_the_next_submit_until_one_finishes() {
        let h = harness(10);
        let ctx = account(&h, PlanTier::Pro, 500).await;

        let mut jobs = Vec::new();
        for _ in 0..3 {
            jobs.push(h.admission.submit(&ctx, GenerationKind::Text, text()).await.unwrap());
        }
        let err = h
            .admission
            .submit(&ctx, GenerationKind::Text, text())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::PlanLimitExceeded { limit: 3 });
        assert_eq!(balance(&h, &ctx).await, 470);

        h.admission.cancel(&ctx, jobs[0].id).await.unwrap();
        assert!(h.admission.submit(&ctx, GenerationKind::Text, text()).await.is_ok());
    }

    #[tokio::test]
    async fn racing_submits_respect_the_cap() {
        let h = harness(100);
        let ctx = account(&h, PlanTier::Pro, 500).await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let admission = Arc::clone(&h.admission);
            let ctx = ctx.clone();
            handles.push(tokio::spawn(async move {
                admission.submit(&ctx, GenerationKind::Text, text()).await
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => admitted += 1,
                Err(CoreError::PlanLimitExceeded { .. }) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(admitted, 3);
        assert_eq!(balance(&h, &ctx).await, 470);
    }

    #[tokio::test]
    async fn balance_never_goes_negative_under_concurrent_submits() {
        let h = harness(100);
        let mut contexts = Vec::new();
        for _ in 0..5 {
            contexts.push(account(&h, PlanTier::Enterprise, 30).await);
        }

        let mut handles = Vec::new();
        for ctx in &contexts {
            for _ in 0..6 {
                let admission = Arc::clone(&h.admission);
                let ctx = ctx.clone();
                handles.push(tokio::spawn(async move {
                    admission.submit(&ctx, GenerationKind::Text, text()).await
                }));
            }
        }
        for handle in handles {
            let _ = handle.await.unwrap();
        }

        for ctx in &contexts {
            let left = balance(&h, ctx).await;
            assert!(left >= 0);
            // Enterprise TEXT costs 8: three fit in 30.
            assert_eq!(left, 30 - 3 * 8);
        }
    }

    #[tokio::test]
    async fn full_queue_fails_fast_without_reserving() {
        let h = harness(1);
        let first = account(&h, PlanTier::Pro, 100).await;
        let second = account(&h, PlanTier::Pro, 100).await;

        h.admission.submit(&first, GenerationKind::Text, text()).await.unwrap();
        let err = h
            .admission
            .submit(&second, GenerationKind::Text, text())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::QueueFull { capacity: 1 });
        assert!(err.is_retryable());
        assert_eq!(balance(&h, &second).await, 100);
        assert_eq!(h.stores.jobs.count_in_flight(second.account_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn cancel_restores_balance_and_dequeues() {
        let h = harness(10);
        let ctx = account(&h, PlanTier::Free, 50).await;

        let image = json!({ "prompt": "cat", "style": "anime" });
        let job = h.admission.submit(&ctx, GenerationKind::Image, image).await.unwrap();
        assert_eq!(balance(&h, &ctx).await, 30);

        let cancelled = h.admission.cancel(&ctx, job.id).await.unwrap();
        assert_eq!(cancelled.state, JobState::Cancelled);
        assert_eq!(balance(&h, &ctx).await, 50);
        assert_eq!(h.dispatcher.position(job.id).await, None);

        let reservation = h.stores.ledger.reservation(job.reservation_id).await.unwrap().unwrap();
        assert_eq!(reservation.state, goldrush_core::ledger::ReservationState::Released);

        assert_matches!(h.admission.cancel(&ctx, job.id).await, Err(CoreError::Conflict(_)));
        assert_eq!(balance(&h, &ctx).await, 50);
    }

    #[tokio::test]
    async fn cancel_checks_ownership_and_existence() {
        let h = harness(10);
        let owner = account(&h, PlanTier::Free, 50).await;
        let other = account(&h, PlanTier::Free, 50).await;
        let job = h.admission.submit(&owner, GenerationKind::Text, text()).await.unwrap();

        assert_matches!(h.admission.cancel(&other, job.id).await, Err(CoreError::Forbidden(_)));
        assert_matches!(
            h.admission.cancel(&owner, 9999).await,
            Err(CoreError::NotFound { entity: "Job", .. })
        );
    }

    #[tokio::test]
    async fn running_job_cannot_be_cancelled() {
        let h = harness(10);
        let ctx = account(&h, PlanTier::Free, 50).await;
        let job = h.admission.submit(&ctx, GenerationKind::Text, text()).await.unwrap();
        h.stores
            .jobs
            .update_state(job.id, JobState::Queued, JobTransition::to(JobState::Running))
            .await
            .unwrap();

        assert_matches!(h.admission.cancel(&ctx, job.id).await, Err(CoreError::Conflict(_)));
        assert_eq!(balance(&h, &ctx).await, 40);
    }

    #[tokio::test]
    async fn higher_plans_are_dispatched_first() {
        let h = harness(10);
        let free = account(&h, PlanTier::Free, 50).await;
        let enterprise = account(&h, PlanTier::Enterprise, 50).await;

        let a = h.admission.submit(&free, GenerationKind::Text, text()).await.unwrap();
        let b = h.admission.submit(&enterprise, GenerationKind::Text, text()).await.unwrap();

        assert_eq!(h.dispatcher.dequeue_next().await, Some(b.id));
        assert_eq!(h.dispatcher.dequeue_next().await, Some(a.id));
    }

    #[tokio::test]
    async fn unknown_account_is_not_found() {
        let h = harness(10);
        let err = h
            .admission
            .submit(&RequestContext::new(777), GenerationKind::Text, text())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::NotFound { entity: "Account", id: 777 });
    }

    #[tokio::test]
    async fn admission_locks_are_pruned_after_use() {
        let h = harness(10);
        let ctx = account(&h, PlanTier::Enterprise, 1_000).await;

        let mut tasks = Vec::new();
        for _ in 0..5 {
            let admission = Arc::clone(&h.admission);
            let ctx = ctx.clone();
            tasks.push(tokio::spawn(async move {
                admission.submit(&ctx, GenerationKind::Text, text()).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(h.admission.locks.len(), 0);

        let err = h
            .admission
            .submit(&ctx, GenerationKind::Text, json!({}))
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::InvalidPayload(_));
        let other = account(&h, PlanTier::Free, 0).await;
        h.admission
            .submit(&other, GenerationKind::Text, text())
            .await
            .unwrap_err();
        assert_eq!(h.admission.locks.len(), 0);
    }
}

use async_trait::async_trait;
use goldrush_core::error::CoreError;
use goldrush_core::job::{validate_transition, Job, JobState, JobTransition, NewJob};
use goldrush_core::store::{JobStore, Page};
use goldrush_core::types::DbId;
use sqlx::PgPool;

use super::db_error;
use crate::repositories::JobRepo;

/// [`JobStore`] over the `jobs` table. State updates are a single
/// conditional UPDATE, so the compare-and-swap holds across processes.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, input: NewJob) -> Result<Job, CoreError> {
        JobRepo::create(&self.pool, &input)
            .await
            .map_err(db_error)?
            .try_into()
    }

    async fn get(&self, id: DbId) -> Result<Option<Job>, CoreError> {
        JobRepo::find_by_id(&self.pool, id)
            .await
            .map_err(db_error)?
            .map(Job::try_from)
            .transpose()
    }

    async fn update_state(
        &self,
        id: DbId,
        expected: JobState,
        transition: JobTransition,
    ) -> Result<Job, CoreError> {
        validate_transition(expected, transition.to)?;

        let updated = JobRepo::compare_and_set_state(&self.pool, id, expected, &transition)
            .await
            .map_err(db_error)?;
        if let Some(row) = updated {
            return row.try_into();
        }

        let current: Job = self
            .get(id)
            .await?
            .ok_or(CoreError::NotFound { entity: "Job", id })?;
        Err(CoreError::StateMismatch {
            job_id: id,
            expected,
            actual: current.state,
        })
    }

    async fn count_in_flight(&self, account_id: DbId) -> Result<i64, CoreError> {
        JobRepo::count_in_flight(&self.pool, account_id)
            .await
            .map_err(db_error)
    }

    async fn list_by_account(&self, account_id: DbId, page: Page) -> Result<Vec<Job>, CoreError> {
        JobRepo::list_by_account(&self.pool, account_id, page)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(Job::try_from)
            .collect()
    }

    async fn list_by_state(&self, state: JobState) -> Result<Vec<Job>, CoreError> {
        JobRepo::list_by_state(&self.pool, state)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(Job::try_from)
            .collect()
    }

    async fn list_by_account_in_state(
        &self,
        account_id: DbId,
        state: JobState,
    ) -> Result<Vec<Job>, CoreError> {
        JobRepo::list_by_account_in_state(&self.pool, account_id, state)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(Job::try_from)
            .collect()
    }
}

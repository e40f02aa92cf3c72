//! Repository for the `jobs` table.

use goldrush_core::job::{JobState, JobTransition, NewJob};
use goldrush_core::store::Page;
use goldrush_core::types::DbId;
use sqlx::PgPool;

use crate::models::job::JobRow;

const COLUMNS: &str = "id, account_id, kind, payload, cost, priority, reservation_id, \
                       state_id, attempts, result, failure_reason, created_at, updated_at";

pub struct JobRepo;

impl JobRepo {
    /// Insert a QUEUED job.
    pub async fn create(pool: &PgPool, input: &NewJob) -> Result<JobRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (account_id, kind, payload, cost, priority, reservation_id, state_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(input.account_id)
            .bind(input.kind.as_str())
            .bind(&input.payload)
            .bind(input.cost)
            .bind(input.priority)
            .bind(input.reservation_id)
            .bind(JobState::Queued.id())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<JobRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Apply `transition` only if the job is still in `expected`.
    ///
    /// Returns `None` when no row matched, either because the job does not
    /// exist or because another writer moved it first.
    pub async fn compare_and_set_state(
        pool: &PgPool,
        id: DbId,
        expected: JobState,
        transition: &JobTransition,
    ) -> Result<Option<JobRow>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs SET
                state_id = $3,
                attempts = COALESCE($4, attempts),
                result = COALESCE($5, result),
                failure_reason = COALESCE($6, failure_reason)
             WHERE id = $1 AND state_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .bind(expected.id())
            .bind(transition.to.id())
            .bind(transition.attempts)
            .bind(&transition.result)
            .bind(&transition.failure_reason)
            .fetch_optional(pool)
            .await
    }

    /// Count the account's QUEUED and RUNNING jobs.
    pub async fn count_in_flight(pool: &PgPool, account_id: DbId) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM jobs WHERE account_id = $1 AND state_id IN ($2, $3)",
        )
        .bind(account_id)
        .bind(JobState::Queued.id())
        .bind(JobState::Running.id())
        .fetch_one(pool)
        .await?;
        Ok(count.0)
    }

    /// List the account's jobs, newest first.
    pub async fn list_by_account(
        pool: &PgPool,
        account_id: DbId,
        page: Page,
    ) -> Result<Vec<JobRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs WHERE account_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(account_id)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(pool)
            .await
    }

    /// List every job in `state`, oldest first.
    pub async fn list_by_state(pool: &PgPool, state: JobState) -> Result<Vec<JobRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs WHERE state_id = $1 ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(state.id())
            .fetch_all(pool)
            .await
    }

    pub async fn list_by_account_in_state(
        pool: &PgPool,
        account_id: DbId,
        state: JobState,
    ) -> Result<Vec<JobRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs WHERE account_id = $1 AND state_id = $2
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(account_id)
            .bind(state.id())
            .fetch_all(pool)
            .await
    }
}

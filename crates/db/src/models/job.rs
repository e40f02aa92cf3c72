//! Job entity model.

use goldrush_core::error::CoreError;
use goldrush_core::job::{Job, JobState};
use goldrush_core::types::{DbId, Gold, Timestamp};
use sqlx::FromRow;
use uuid::Uuid;

use super::corrupt;

/// Row from the `jobs` table. `state_id` references `job_states`.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: DbId,
    pub account_id: DbId,
    pub kind: String,
    pub payload: serde_json::Value,
    pub cost: Gold,
    pub priority: i32,
    pub reservation_id: Uuid,
    pub state_id: i16,
    pub attempts: i32,
    pub result: Option<serde_json::Value>,
    pub failure_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<JobRow> for Job {
    type Error = CoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let kind = row
            .kind
            .parse()
            .map_err(|_| corrupt("jobs", "kind", &row.kind))?;
        let state =
            JobState::from_id(row.state_id).ok_or_else(|| corrupt("jobs", "state_id", row.state_id))?;
        Ok(Job {
            id: row.id,
            account_id: row.account_id,
            kind,
            payload: row.payload,
            cost: row.cost,
            priority: row.priority,
            reservation_id: row.reservation_id,
            state,
            attempts: row.attempts,
            result: row.result,
            failure_reason: row.failure_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

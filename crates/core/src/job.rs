//! Job lifecycle: states, the transition graph, and the job record.
//!
//! ```text
//! QUEUED -> RUNNING -> SUCCEEDED
//! QUEUED -> RUNNING -> FAILED
//! QUEUED -> CANCELLED
//! ```
//!
//! QUEUED is initial; SUCCEEDED, FAILED and CANCELLED are terminal.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::generation::GenerationKind;
use crate::types::{DbId, Gold, Timestamp};

/// Failure reason recorded when the provider never answered in time.
pub const REASON_PROVIDER_TIMEOUT: &str = "ProviderTimeout";

/// Failure reason recorded by startup recovery for jobs left RUNNING by a
/// previous process.
pub const REASON_WORKER_LOST: &str = "WorkerLost";

/// Failure reason recorded when a job is claimed after its reservation was
/// released by the sweeper. The provider is never called for such a job.
pub const REASON_RESERVATION_EXPIRED: &str = "ReservationExpired";

// ---------------------------------------------------------------------------
// JobState
// ---------------------------------------------------------------------------

/// Job lifecycle state. Discriminants match the `job_states` seed data.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Queued = 1,
    Running = 2,
    Succeeded = 3,
    Failed = 4,
    Cancelled = 5,
}

impl JobState {
    pub const ALL: [JobState; 5] = [
        JobState::Queued,
        JobState::Running,
        JobState::Succeeded,
        JobState::Failed,
        JobState::Cancelled,
    ];

    /// Return the database state ID.
    pub fn id(self) -> i16 {
        self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.id() == id)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "QUEUED",
            JobState::Running => "RUNNING",
            JobState::Succeeded => "SUCCEEDED",
            JobState::Failed => "FAILED",
            JobState::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Cancelled
        )
    }

    /// QUEUED and RUNNING jobs count against the plan's concurrency cap.
    pub fn is_in_flight(self) -> bool {
        !self.is_terminal()
    }

    /// States reachable from `self` in one step.
    pub fn valid_transitions(self) -> &'static [JobState] {
        match self {
            JobState::Queued => &[JobState::Running, JobState::Cancelled],
            JobState::Running => &[JobState::Succeeded, JobState::Failed],
            JobState::Succeeded | JobState::Failed | JobState::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, to: JobState) -> bool {
        self.valid_transitions().contains(&to)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate a state transition against the lifecycle graph.
pub fn validate_transition(from: JobState, to: JobState) -> Result<(), CoreError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition { from, to })
    }
}

// ---------------------------------------------------------------------------
// Job record
// ---------------------------------------------------------------------------

/// A generation job as stored by the job store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: DbId,
    pub account_id: DbId,
    pub kind: GenerationKind,
    pub payload: serde_json::Value,
    /// Gold reserved for this job at admission.
    pub cost: Gold,
    pub priority: i32,
    pub reservation_id: Uuid,
    pub state: JobState,
    /// Provider attempts made so far.
    pub attempts: i32,
    pub result: Option<serde_json::Value>,
    pub failure_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input for creating a job. Jobs always start QUEUED.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub account_id: DbId,
    pub kind: GenerationKind,
    pub payload: serde_json::Value,
    pub cost: Gold,
    pub priority: i32,
    pub reservation_id: Uuid,
}

/// The target of a compare-and-swap state update, with the fields that
/// change alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct JobTransition {
    pub to: JobState,
    pub attempts: Option<i32>,
    pub result: Option<serde_json::Value>,
    pub failure_reason: Option<String>,
}

impl JobTransition {
    pub fn to(state: JobState) -> Self {
        Self {
            to: state,
            attempts: None,
            result: None,
            failure_reason: None,
        }
    }

    pub fn succeeded(result: serde_json::Value, attempts: i32) -> Self {
        Self {
            to: JobState::Succeeded,
            attempts: Some(attempts),
            result: Some(result),
            failure_reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>, attempts: i32) -> Self {
        Self {
            to: JobState::Failed,
            attempts: Some(attempts),
            result: None,
            failure_reason: Some(reason.into()),
        }
    }

    /// Apply this transition to an in-memory record. The caller is
    /// responsible for the compare-and-swap check.
    pub fn apply(&self, job: &mut Job, now: Timestamp) {
        job.state = self.to;
        if let Some(attempts) = self.attempts {
            job.attempts = attempts;
        }
        if self.result.is_some() {
            job.result = self.result.clone();
        }
        if self.failure_reason.is_some() {
            job.failure_reason = self.failure_reason.clone();
        }
        job.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn state_ids_match_seed_data() {
        assert_eq!(JobState::Queued.id(), 1);
        assert_eq!(JobState::Running.id(), 2);
        assert_eq!(JobState::Succeeded.id(), 3);
        assert_eq!(JobState::Failed.id(), 4);
        assert_eq!(JobState::Cancelled.id(), 5);
        for state in JobState::ALL {
            assert_eq!(JobState::from_id(state.id()), Some(state));
        }
        assert_eq!(JobState::from_id(0), None);
    }

    #[test]
    fn allowed_transitions() {
        assert!(validate_transition(JobState::Queued, JobState::Running).is_ok());
        assert!(validate_transition(JobState::Queued, JobState::Cancelled).is_ok());
        assert!(validate_transition(JobState::Running, JobState::Succeeded).is_ok());
        assert!(validate_transition(JobState::Running, JobState::Failed).is_ok());
    }

    #[test]
    fn every_unlisted_transition_is_rejected() {
        let allowed = [
            (JobState::Queued, JobState::Running),
            (JobState::Queued, JobState::Cancelled),
            (JobState::Running, JobState::Succeeded),
            (JobState::Running, JobState::Failed),
        ];
        for from in JobState::ALL {
            for to in JobState::ALL {
                if allowed.contains(&(from, to)) {
                    continue;
                }
                assert_matches!(
                    validate_transition(from, to),
                    Err(CoreError::InvalidTransition { .. }),
                    "{from} -> {to} must be rejected"
                );
            }
        }
    }

    #[test]
    fn running_job_cannot_be_cancelled() {
        assert!(!JobState::Running.can_transition_to(JobState::Cancelled));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for state in [JobState::Succeeded, JobState::Failed, JobState::Cancelled] {
            assert!(state.is_terminal());
            assert!(state.valid_transitions().is_empty());
        }
        assert!(JobState::Queued.is_in_flight());
        assert!(JobState::Running.is_in_flight());
    }

    #[test]
    fn apply_keeps_untouched_fields() {
        let now = chrono::Utc::now();
        let mut job = Job {
            id: 1,
            account_id: 7,
            kind: GenerationKind::Text,
            payload: serde_json::json!({}),
            cost: 10,
            priority: 0,
            reservation_id: Uuid::new_v4(),
            state: JobState::Running,
            attempts: 0,
            result: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        };
        JobTransition::failed(REASON_PROVIDER_TIMEOUT, 3).apply(&mut job, now);
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.attempts, 3);
        assert_eq!(job.failure_reason.as_deref(), Some(REASON_PROVIDER_TIMEOUT));
        assert!(job.result.is_none());
    }
}

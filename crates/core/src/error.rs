use uuid::Uuid;

use crate::job::JobState;
use crate::ledger::ReservationState;
use crate::types::{DbId, Gold};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// The request body does not match the shape required by its generation kind.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Insufficient gold balance: required {required}, available {available}")]
    InsufficientBalance { required: Gold, available: Gold },

    /// The account already has as many in-flight jobs as its plan allows.
    #[error("Plan limit exceeded: at most {limit} concurrent jobs")]
    PlanLimitExceeded { limit: i32 },

    /// The dispatch queue is at capacity. Retryable after a delay.
    #[error("Queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("Invalid job transition: {from} -> {to}")]
    InvalidTransition { from: JobState, to: JobState },

    /// Compare-and-swap on a job's state lost against a concurrent writer.
    #[error("Job {job_id} is {actual}, expected {expected}")]
    StateMismatch {
        job_id: DbId,
        expected: JobState,
        actual: JobState,
    },

    #[error("Reservation not found: {0}")]
    ReservationNotFound(Uuid),

    /// Commit or release of a reservation that is no longer held.
    #[error("Reservation {id} is already {state}")]
    ReservationSettled { id: Uuid, state: ReservationState },
}

impl CoreError {
    /// Whether the caller may retry the same request later without changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::QueueFull { .. } | CoreError::PlanLimitExceeded { .. }
        )
    }
}

//! PostgreSQL implementations of the `goldrush-core` storage traits.

mod account_store;
mod job_store;
mod ledger;

pub use account_store::PgAccountStore;
pub use job_store::PgJobStore;
pub use ledger::PgLedger;

use goldrush_core::error::CoreError;

/// Translate a database error. Unique violations on `uq_*` constraints
/// become [`CoreError::Conflict`]; anything else is internal.
pub(crate) fn db_error(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            let constraint = db_err.constraint().unwrap_or("unknown");
            if constraint.starts_with("uq_") {
                return CoreError::Conflict(format!(
                    "Duplicate value violates unique constraint: {constraint}"
                ));
            }
        }
    }
    tracing::error!(error = %err, "Database error");
    CoreError::Internal("An internal error occurred".into())
}

/// Whether `err` is a unique violation on `constraint`.
pub(crate) fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505") && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}

//! Raw SQL access, one zero-sized repository per table.
//!
//! Repositories return `sqlx::Error` and know nothing about the domain
//! error type; `crate::store` does that translation.

pub mod account_repo;
pub mod job_repo;
pub mod ledger_repo;

pub use account_repo::AccountRepo;
pub use job_repo::JobRepo;
pub use ledger_repo::{LedgerRepo, ReserveOutcome, SettleOutcome};

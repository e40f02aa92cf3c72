//! In-memory implementations of the store traits.
//!
//! Used by tests and by `STORE_BACKEND=memory`. Nothing survives a restart.

pub mod account_store;
pub mod job_store;
pub mod ledger;

pub use account_store::MemoryAccountStore;
pub use job_store::MemoryJobStore;
pub use ledger::MemoryLedger;

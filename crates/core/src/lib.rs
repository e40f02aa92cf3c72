//! Goldrush domain layer.
//!
//! Pure types and contracts shared by every other crate: generation kinds
//! and payload validation, plans, the job lifecycle, the ledger and store
//! traits, and retry policy. No I/O lives here.

pub mod backoff;
pub mod context;
pub mod error;
pub mod generation;
pub mod job;
pub mod ledger;
pub mod plan;
pub mod store;
pub mod types;

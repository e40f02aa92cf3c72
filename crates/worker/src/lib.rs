//! Goldrush worker pool.
//!
//! A fixed number of tokio tasks pull job ids from the engine's
//! dispatcher, claim each job with a QUEUED -> RUNNING compare-and-swap,
//! call the generation provider under a timeout with bounded retries, and
//! finalize the job and its reservation.

pub mod pool;

pub use pool::WorkerPool;

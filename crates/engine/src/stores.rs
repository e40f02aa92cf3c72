use std::sync::Arc;

use goldrush_core::ledger::Ledger;
use goldrush_core::store::{AccountStore, JobStore};

use crate::memory::{MemoryAccountStore, MemoryJobStore, MemoryLedger};

/// The three stores every service is built on, behind trait objects so the
/// in-memory and PostgreSQL backends are interchangeable.
#[derive(Clone)]
pub struct Stores {
    pub accounts: Arc<dyn AccountStore>,
    pub ledger: Arc<dyn Ledger>,
    pub jobs: Arc<dyn JobStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        let ledger = Arc::new(MemoryLedger::new());
        Self {
            accounts: Arc::new(MemoryAccountStore::new(Arc::clone(&ledger))),
            ledger,
            jobs: Arc::new(MemoryJobStore::new()),
        }
    }
}

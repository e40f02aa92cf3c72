//! Storage contracts for accounts and jobs.
//!
//! Both have an in-memory implementation (`goldrush-engine`) and a
//! PostgreSQL implementation (`goldrush-db`).

use async_trait::async_trait;
use serde::Serialize;

use crate::error::CoreError;
use crate::job::{Job, JobState, JobTransition, NewJob};
use crate::ledger::LedgerEntry;
use crate::plan::PlanTier;
use crate::types::{DbId, Gold, Timestamp};

/// Default page size for listings.
pub const DEFAULT_LIMIT: i64 = 50;

/// Maximum page size for listings.
pub const MAX_LIMIT: i64 = 100;

/// Clamped pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// An account row. Contains the password hash -- never serialize this to
/// API responses directly; use [`AccountView`].
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: DbId,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub plan: PlanTier,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Public account representation (no credential hash).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: DbId,
    pub email: String,
    pub name: String,
    pub plan: PlanTier,
    pub created_at: Timestamp,
}

impl From<&Account> for AccountView {
    fn from(a: &Account) -> Self {
        Self {
            id: a.id,
            email: a.email.clone(),
            name: a.name.clone(),
            plan: a.plan,
            created_at: a.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub plan: PlanTier,
}

/// Lower-case and trim an email so lookups are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account. Fails with [`CoreError::Conflict`] when the
    /// email is already registered.
    async fn create(&self, input: NewAccount) -> Result<Account, CoreError>;

    /// Insert a new account together with its ledger entry. Either both
    /// exist afterwards or neither does.
    async fn create_with_ledger(
        &self,
        input: NewAccount,
        initial_balance: Gold,
    ) -> Result<(Account, LedgerEntry), CoreError>;

    /// Disable an account. Returns `false` when no such account exists.
    async fn deactivate(&self, id: DbId) -> Result<bool, CoreError>;

    async fn find_by_id(&self, id: DbId) -> Result<Option<Account>, CoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, CoreError>;
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new QUEUED job.
    async fn create(&self, input: NewJob) -> Result<Job, CoreError>;

    async fn get(&self, id: DbId) -> Result<Option<Job>, CoreError>;

    /// Compare-and-swap state update.
    ///
    /// Fails with [`CoreError::InvalidTransition`] if `expected -> to` is not
    /// in the lifecycle graph, and with [`CoreError::StateMismatch`] if the
    /// stored state is not `expected`. The stored job is unchanged on error.
    async fn update_state(
        &self,
        id: DbId,
        expected: JobState,
        transition: JobTransition,
    ) -> Result<Job, CoreError>;

    /// Number of QUEUED or RUNNING jobs owned by the account.
    async fn count_in_flight(&self, account_id: DbId) -> Result<i64, CoreError>;

    /// The account's jobs, newest first.
    async fn list_by_account(&self, account_id: DbId, page: Page) -> Result<Vec<Job>, CoreError>;

    /// All jobs in `state`, oldest first.
    async fn list_by_state(&self, state: JobState) -> Result<Vec<Job>, CoreError>;

    /// The account's jobs in `state`, oldest first, unpaginated.
    async fn list_by_account_in_state(
        &self,
        account_id: DbId,
        state: JobState,
    ) -> Result<Vec<Job>, CoreError>;
}

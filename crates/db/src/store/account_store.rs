use async_trait::async_trait;
use goldrush_core::error::CoreError;
use goldrush_core::ledger::LedgerEntry;
use goldrush_core::store::{normalize_email, Account, AccountStore, NewAccount};
use goldrush_core::types::{DbId, Gold};
use sqlx::PgPool;

use super::{db_error, is_unique_violation};
use crate::repositories::AccountRepo;

/// [`AccountStore`] over the `accounts` table.
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn create(&self, mut input: NewAccount) -> Result<Account, CoreError> {
        input.email = normalize_email(&input.email);
        match AccountRepo::create(&self.pool, &input).await {
            Ok(row) => row.try_into(),
            Err(e) if is_unique_violation(&e, "uq_accounts_email") => {
                Err(CoreError::Conflict("User already exists".into()))
            }
            Err(e) => Err(db_error(e)),
        }
    }

    async fn create_with_ledger(
        &self,
        mut input: NewAccount,
        initial_balance: Gold,
    ) -> Result<(Account, LedgerEntry), CoreError> {
        if initial_balance < 0 {
            return Err(CoreError::Validation(
                "Initial balance must not be negative".into(),
            ));
        }
        input.email = normalize_email(&input.email);
        match AccountRepo::create_with_ledger(&self.pool, &input, initial_balance).await {
            Ok((account, entry)) => Ok((account.try_into()?, entry.into())),
            Err(e) if is_unique_violation(&e, "uq_accounts_email") => {
                Err(CoreError::Conflict("User already exists".into()))
            }
            Err(e) => Err(db_error(e)),
        }
    }

    async fn deactivate(&self, id: DbId) -> Result<bool, CoreError> {
        AccountRepo::deactivate(&self.pool, id).await.map_err(db_error)
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<Account>, CoreError> {
        AccountRepo::find_by_id(&self.pool, id)
            .await
            .map_err(db_error)?
            .map(Account::try_from)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, CoreError> {
        AccountRepo::find_by_email(&self.pool, &normalize_email(email))
            .await
            .map_err(db_error)?
            .map(Account::try_from)
            .transpose()
    }
}

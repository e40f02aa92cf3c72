//! Repository for the `accounts` table.

use goldrush_core::store::NewAccount;
use goldrush_core::types::{DbId, Gold};
use sqlx::PgPool;

use super::LedgerRepo;
use crate::models::account::AccountRow;
use crate::models::ledger::LedgerEntryRow;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, email, name, password_hash, plan, is_active, created_at, updated_at";

pub struct AccountRepo;

impl AccountRepo {
    /// Insert a new account, returning the created row. A duplicate email
    /// violates `uq_accounts_email`.
    pub async fn create(pool: &PgPool, input: &NewAccount) -> Result<AccountRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO accounts (email, name, password_hash, plan)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AccountRow>(&query)
            .bind(&input.email)
            .bind(&input.name)
            .bind(&input.password_hash)
            .bind(input.plan.as_str())
            .fetch_one(pool)
            .await
    }

    /// Insert an account and its ledger entry in one transaction.
    pub async fn create_with_ledger(
        pool: &PgPool,
        input: &NewAccount,
        initial_balance: Gold,
    ) -> Result<(AccountRow, LedgerEntryRow), sqlx::Error> {
        let mut tx = pool.begin().await?;
        let query = format!(
            "INSERT INTO accounts (email, name, password_hash, plan)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        let account = sqlx::query_as::<_, AccountRow>(&query)
            .bind(&input.email)
            .bind(&input.name)
            .bind(&input.password_hash)
            .bind(input.plan.as_str())
            .fetch_one(&mut *tx)
            .await?;
        let entry = LedgerRepo::open_in_tx(&mut tx, account.id, initial_balance).await?;
        tx.commit().await?;
        Ok((account, entry))
    }

    /// Set `is_active = false`. Returns whether a row was updated.
    pub async fn deactivate(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE accounts SET is_active = false WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<AccountRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM accounts WHERE id = $1");
        sqlx::query_as::<_, AccountRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find an account by its stored (already lower-cased) email.
    pub async fn find_by_email(
        pool: &PgPool,
        email: &str,
    ) -> Result<Option<AccountRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM accounts WHERE email = $1");
        sqlx::query_as::<_, AccountRow>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }
}

//! Account entity model.

use goldrush_core::error::CoreError;
use goldrush_core::store::Account;
use goldrush_core::types::{DbId, Timestamp};
use sqlx::FromRow;

use super::corrupt;

/// Full row from the `accounts` table.
///
/// Contains the password hash -- NEVER serialize this to API responses directly.
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub id: DbId,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub plan: String,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<AccountRow> for Account {
    type Error = CoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let plan = row
            .plan
            .parse()
            .map_err(|_| corrupt("accounts", "plan", &row.plan))?;
        Ok(Account {
            id: row.id,
            email: row.email,
            name: row.name,
            password_hash: row.password_hash,
            plan,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

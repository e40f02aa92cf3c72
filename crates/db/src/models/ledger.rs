//! Ledger balance and reservation models.

use goldrush_core::error::CoreError;
use goldrush_core::ledger::{LedgerEntry, Reservation, ReservationState};
use goldrush_core::types::{DbId, Gold, Timestamp};
use sqlx::FromRow;
use uuid::Uuid;

use super::corrupt;

/// Row from the `ledger_entries` table.
#[derive(Debug, Clone, FromRow)]
pub struct LedgerEntryRow {
    pub account_id: DbId,
    pub balance: Gold,
    pub version: i64,
}

impl From<LedgerEntryRow> for LedgerEntry {
    fn from(row: LedgerEntryRow) -> Self {
        LedgerEntry {
            account_id: row.account_id,
            balance: row.balance,
            version: row.version,
        }
    }
}

/// Row from the `reservations` table. `state_id` references `reservation_states`.
#[derive(Debug, Clone, FromRow)]
pub struct ReservationRow {
    pub id: Uuid,
    pub account_id: DbId,
    pub amount: Gold,
    pub state_id: i16,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub settled_at: Option<Timestamp>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = CoreError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        let state = ReservationState::from_id(row.state_id)
            .ok_or_else(|| corrupt("reservations", "state_id", row.state_id))?;
        Ok(Reservation {
            id: row.id,
            account_id: row.account_id,
            amount: row.amount,
            state,
            created_at: row.created_at,
            expires_at: row.expires_at,
            settled_at: row.settled_at,
        })
    }
}

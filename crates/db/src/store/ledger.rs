use async_trait::async_trait;
use chrono::Utc;
use goldrush_core::error::CoreError;
use goldrush_core::ledger::{
    ensure_positive_amount, settled_error, Ledger, LedgerEntry, Reservation, ReservationState,
};
use goldrush_core::types::{DbId, Gold, Timestamp};
use sqlx::PgPool;
use uuid::Uuid;

use super::{db_error, is_unique_violation};
use crate::repositories::{LedgerRepo, ReserveOutcome, SettleOutcome};

/// [`Ledger`] over `ledger_entries` and `reservations`.
#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn settle(&self, id: Uuid, to: ReservationState) -> Result<Reservation, CoreError> {
        match LedgerRepo::settle(&self.pool, id, to).await.map_err(db_error)? {
            SettleOutcome::Settled(row) => row.try_into(),
            SettleOutcome::AlreadySettled(row) => {
                let current: Reservation = row.try_into()?;
                Err(settled_error(&current))
            }
            SettleOutcome::Missing => Err(CoreError::ReservationNotFound(id)),
        }
    }
}

#[async_trait]
impl Ledger for PgLedger {
    async fn open_account(
        &self,
        account_id: DbId,
        initial_balance: Gold,
    ) -> Result<LedgerEntry, CoreError> {
        if initial_balance < 0 {
            return Err(CoreError::Validation(
                "Initial balance must not be negative".into(),
            ));
        }
        match LedgerRepo::open(&self.pool, account_id, initial_balance).await {
            Ok(row) => Ok(row.into()),
            Err(e) if is_unique_violation(&e, "ledger_entries_pkey") => Err(CoreError::Conflict(
                format!("Ledger entry for account {account_id} already exists"),
            )),
            Err(e) => Err(db_error(e)),
        }
    }

    async fn balance(&self, account_id: DbId) -> Result<Option<LedgerEntry>, CoreError> {
        Ok(LedgerRepo::find_entry(&self.pool, account_id)
            .await
            .map_err(db_error)?
            .map(LedgerEntry::from))
    }

    async fn reserve(
        &self,
        account_id: DbId,
        amount: Gold,
        hold_for: chrono::Duration,
    ) -> Result<Reservation, CoreError> {
        ensure_positive_amount(amount)?;
        let expires_at = Utc::now() + hold_for;

        let outcome = LedgerRepo::reserve(&self.pool, Uuid::new_v4(), account_id, amount, expires_at)
            .await
            .map_err(db_error)?;
        match outcome {
            ReserveOutcome::Reserved(row) => row.try_into(),
            ReserveOutcome::Insufficient { available } => Err(CoreError::InsufficientBalance {
                required: amount,
                available,
            }),
            ReserveOutcome::MissingAccount => Err(CoreError::NotFound {
                entity: "LedgerEntry",
                id: account_id,
            }),
        }
    }

    async fn commit(&self, reservation_id: Uuid) -> Result<Reservation, CoreError> {
        self.settle(reservation_id, ReservationState::Committed).await
    }

    async fn release(&self, reservation_id: Uuid) -> Result<Reservation, CoreError> {
        self.settle(reservation_id, ReservationState::Released).await
    }

    async fn reservation(&self, reservation_id: Uuid) -> Result<Option<Reservation>, CoreError> {
        LedgerRepo::find_reservation(&self.pool, reservation_id)
            .await
            .map_err(db_error)?
            .map(Reservation::try_from)
            .transpose()
    }

    async fn release_expired(&self, now: Timestamp) -> Result<Vec<Reservation>, CoreError> {
        LedgerRepo::release_expired(&self.pool, now)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(Reservation::try_from)
            .collect()
    }
}

//! Repository for `ledger_entries` and `reservations`.
//!
//! Every balance change runs in one transaction with the reservation row it
//! belongs to. The balance row's `CHECK (balance >= 0)` and the conditional
//! `WHERE balance >= amount` together keep the balance non-negative; row
//! locks taken by the UPDATE serialize concurrent writers on one account.

use goldrush_core::ledger::ReservationState;
use goldrush_core::types::{DbId, Gold, Timestamp};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::ledger::{LedgerEntryRow, ReservationRow};

const ENTRY_COLUMNS: &str = "account_id, balance, version";

const RESERVATION_COLUMNS: &str =
    "id, account_id, amount, state_id, created_at, expires_at, settled_at";

/// Result of [`LedgerRepo::reserve`].
#[derive(Debug)]
pub enum ReserveOutcome {
    Reserved(ReservationRow),
    Insufficient { available: Gold },
    MissingAccount,
}

/// Result of [`LedgerRepo::settle`].
#[derive(Debug)]
pub enum SettleOutcome {
    Settled(ReservationRow),
    /// The reservation was already committed or released; carries its
    /// current row.
    AlreadySettled(ReservationRow),
    Missing,
}

pub struct LedgerRepo;

impl LedgerRepo {
    /// Insert the balance row for a new account.
    pub async fn open(
        pool: &PgPool,
        account_id: DbId,
        balance: Gold,
    ) -> Result<LedgerEntryRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO ledger_entries (account_id, balance) VALUES ($1, $2)
             RETURNING {ENTRY_COLUMNS}"
        );
        sqlx::query_as::<_, LedgerEntryRow>(&query)
            .bind(account_id)
            .bind(balance)
            .fetch_one(pool)
            .await
    }

    /// Insert the balance row inside a caller-owned transaction.
    pub async fn open_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        account_id: DbId,
        balance: Gold,
    ) -> Result<LedgerEntryRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO ledger_entries (account_id, balance) VALUES ($1, $2)
             RETURNING {ENTRY_COLUMNS}"
        );
        sqlx::query_as::<_, LedgerEntryRow>(&query)
            .bind(account_id)
            .bind(balance)
            .fetch_one(&mut **tx)
            .await
    }

    pub async fn find_entry(
        pool: &PgPool,
        account_id: DbId,
    ) -> Result<Option<LedgerEntryRow>, sqlx::Error> {
        let query = format!("SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE account_id = $1");
        sqlx::query_as::<_, LedgerEntryRow>(&query)
            .bind(account_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_reservation(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<ReservationRow>, sqlx::Error> {
        let query = format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1");
        sqlx::query_as::<_, ReservationRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Debit `amount` and record a HELD reservation, atomically.
    pub async fn reserve(
        pool: &PgPool,
        id: Uuid,
        account_id: DbId,
        amount: Gold,
        expires_at: Timestamp,
    ) -> Result<ReserveOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let debited = sqlx::query(
            "UPDATE ledger_entries SET balance = balance - $2, version = version + 1
             WHERE account_id = $1 AND balance >= $2",
        )
        .bind(account_id)
        .bind(amount)
        .execute(&mut *tx)
        .await?;

        if debited.rows_affected() == 0 {
            let available: Option<(Gold,)> =
                sqlx::query_as("SELECT balance FROM ledger_entries WHERE account_id = $1")
                    .bind(account_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;
            return Ok(match available {
                Some((available,)) => ReserveOutcome::Insufficient { available },
                None => ReserveOutcome::MissingAccount,
            });
        }

        let query = format!(
            "INSERT INTO reservations (id, account_id, amount, state_id, expires_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {RESERVATION_COLUMNS}"
        );
        let reservation = sqlx::query_as::<_, ReservationRow>(&query)
            .bind(id)
            .bind(account_id)
            .bind(amount)
            .bind(ReservationState::Held.id())
            .bind(expires_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ReserveOutcome::Reserved(reservation))
    }

    /// Move a HELD reservation to `to`. Releasing credits the amount back.
    pub async fn settle(
        pool: &PgPool,
        id: Uuid,
        to: ReservationState,
    ) -> Result<SettleOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE reservations SET state_id = $2, settled_at = NOW()
             WHERE id = $1 AND state_id = $3
             RETURNING {RESERVATION_COLUMNS}"
        );
        let settled = sqlx::query_as::<_, ReservationRow>(&query)
            .bind(id)
            .bind(to.id())
            .bind(ReservationState::Held.id())
            .fetch_optional(&mut *tx)
            .await?;

        let Some(reservation) = settled else {
            let query = format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1");
            let current = sqlx::query_as::<_, ReservationRow>(&query)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;
            return Ok(match current {
                Some(row) => SettleOutcome::AlreadySettled(row),
                None => SettleOutcome::Missing,
            });
        };

        let refund = if to == ReservationState::Released {
            reservation.amount
        } else {
            0
        };
        Self::apply_settlement(&mut tx, reservation.account_id, refund).await?;

        tx.commit().await?;
        Ok(SettleOutcome::Settled(reservation))
    }

    /// Release every HELD reservation that expired at or before `now`.
    pub async fn release_expired(
        pool: &PgPool,
        now: Timestamp,
    ) -> Result<Vec<ReservationRow>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE reservations SET state_id = $1, settled_at = NOW()
             WHERE state_id = $2 AND expires_at <= $3
             RETURNING {RESERVATION_COLUMNS}"
        );
        let released = sqlx::query_as::<_, ReservationRow>(&query)
            .bind(ReservationState::Released.id())
            .bind(ReservationState::Held.id())
            .bind(now)
            .fetch_all(&mut *tx)
            .await?;

        for reservation in &released {
            Self::apply_settlement(&mut tx, reservation.account_id, reservation.amount).await?;
        }

        tx.commit().await?;
        Ok(released)
    }

    /// Credit `refund` (possibly zero) and bump the entry version.
    async fn apply_settlement(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        account_id: DbId,
        refund: Gold,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE ledger_entries SET balance = balance + $2, version = version + 1
             WHERE account_id = $1",
        )
        .bind(account_id)
        .bind(refund)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

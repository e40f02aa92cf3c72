//! Credit ledger contract.
//!
//! A reservation moves gold out of the available balance immediately. It is
//! then either committed (the debit becomes final) or released (the gold is
//! returned). Commit and release are mutually exclusive and each can happen
//! at most once.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::types::{DbId, Gold, Timestamp};

/// Reservation lifecycle state. Discriminants match `reservation_states`.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationState {
    Held = 1,
    Committed = 2,
    Released = 3,
}

impl ReservationState {
    pub fn id(self) -> i16 {
        self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(ReservationState::Held),
            2 => Some(ReservationState::Committed),
            3 => Some(ReservationState::Released),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReservationState::Held => "HELD",
            ReservationState::Committed => "COMMITTED",
            ReservationState::Released => "RELEASED",
        }
    }
}

impl fmt::Display for ReservationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-account balance. `version` increases by one on every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub account_id: DbId,
    pub balance: Gold,
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Uuid,
    pub account_id: DbId,
    pub amount: Gold,
    pub state: ReservationState,
    pub created_at: Timestamp,
    /// Past this instant a still-held reservation is auto-released.
    pub expires_at: Timestamp,
    pub settled_at: Option<Timestamp>,
}

impl Reservation {
    pub fn is_held(&self) -> bool {
        self.state == ReservationState::Held
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.is_held() && self.expires_at <= now
    }
}

/// Per-account credit ledger.
///
/// Implementations serialize all mutations of one account (lock or version
/// check) and never let a committed balance drop below zero.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Create the ledger entry for a new account.
    async fn open_account(&self, account_id: DbId, initial_balance: Gold)
        -> Result<LedgerEntry, CoreError>;

    async fn balance(&self, account_id: DbId) -> Result<Option<LedgerEntry>, CoreError>;

    /// Hold `amount` gold for up to `hold_for`. Fails with
    /// [`CoreError::InsufficientBalance`] without side effects.
    async fn reserve(
        &self,
        account_id: DbId,
        amount: Gold,
        hold_for: chrono::Duration,
    ) -> Result<Reservation, CoreError>;

    /// Finalize a held reservation.
    async fn commit(&self, reservation_id: Uuid) -> Result<Reservation, CoreError>;

    /// Return a held reservation's gold to the account.
    async fn release(&self, reservation_id: Uuid) -> Result<Reservation, CoreError>;

    async fn reservation(&self, reservation_id: Uuid) -> Result<Option<Reservation>, CoreError>;

    /// Release every held reservation whose hold expired at or before `now`.
    async fn release_expired(&self, now: Timestamp) -> Result<Vec<Reservation>, CoreError>;
}

/// Reject zero or negative amounts before touching any balance.
pub fn ensure_positive_amount(amount: Gold) -> Result<(), CoreError> {
    if amount <= 0 {
        return Err(CoreError::Validation(format!(
            "Amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

/// Error for commit/release of a reservation that is not held.
pub fn settled_error(reservation: &Reservation) -> CoreError {
    CoreError::ReservationSettled {
        id: reservation.id,
        state: reservation.state,
    }
}

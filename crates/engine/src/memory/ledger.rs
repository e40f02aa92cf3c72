//! In-memory ledger.
//!
//! Each account's balance and reservations live in one "book" behind its own
//! mutex; a reservation index maps reservation ids back to their account.
//! Mutations on one account are serialized by that account's mutex, and no
//! lock is ever held across unrelated accounts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use goldrush_core::error::CoreError;
use goldrush_core::ledger::{
    ensure_positive_amount, settled_error, Ledger, LedgerEntry, Reservation, ReservationState,
};
use goldrush_core::types::{DbId, Gold, Timestamp};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

struct Book {
    entry: LedgerEntry,
    reservations: HashMap<Uuid, Reservation>,
}

impl Book {
    /// Settle a held reservation. Releasing returns its amount to the balance.
    fn settle(
        &mut self,
        reservation_id: Uuid,
        to: ReservationState,
        now: Timestamp,
    ) -> Result<Reservation, CoreError> {
        let reservation = self
            .reservations
            .get_mut(&reservation_id)
            .ok_or(CoreError::ReservationNotFound(reservation_id))?;

        if !reservation.is_held() {
            return Err(settled_error(reservation));
        }

        reservation.state = to;
        reservation.settled_at = Some(now);
        if to == ReservationState::Released {
            self.entry.balance += reservation.amount;
        }
        self.entry.version += 1;
        Ok(reservation.clone())
    }
}

#[derive(Default)]
pub struct MemoryLedger {
    books: RwLock<HashMap<DbId, Arc<Mutex<Book>>>>,
    index: RwLock<HashMap<Uuid, DbId>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    async fn book(&self, account_id: DbId) -> Result<Arc<Mutex<Book>>, CoreError> {
        self.books
            .read()
            .await
            .get(&account_id)
            .cloned()
            .ok_or(CoreError::NotFound {
                entity: "LedgerEntry",
                id: account_id,
            })
    }

    async fn book_for_reservation(&self, reservation_id: Uuid) -> Result<Arc<Mutex<Book>>, CoreError> {
        let account_id = self
            .index
            .read()
            .await
            .get(&reservation_id)
            .copied()
            .ok_or(CoreError::ReservationNotFound(reservation_id))?;
        self.book(account_id).await
    }

    async fn settle(
        &self,
        reservation_id: Uuid,
        to: ReservationState,
    ) -> Result<Reservation, CoreError> {
        let book = self.book_for_reservation(reservation_id).await?;
        let mut book = book.lock().await;
        book.settle(reservation_id, to, Utc::now())
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
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

        let mut books = self.books.write().await;
        if books.contains_key(&account_id) {
            return Err(CoreError::Conflict(format!(
                "Ledger entry for account {account_id} already exists"
            )));
        }

        let entry = LedgerEntry {
            account_id,
            balance: initial_balance,
            version: 0,
        };
        books.insert(
            account_id,
            Arc::new(Mutex::new(Book {
                entry: entry.clone(),
                reservations: HashMap::new(),
            })),
        );
        Ok(entry)
    }

    async fn balance(&self, account_id: DbId) -> Result<Option<LedgerEntry>, CoreError> {
        let Some(book) = self.books.read().await.get(&account_id).cloned() else {
            return Ok(None);
        };
        let entry = book.lock().await.entry.clone();
        Ok(Some(entry))
    }

    async fn reserve(
        &self,
        account_id: DbId,
        amount: Gold,
        hold_for: chrono::Duration,
    ) -> Result<Reservation, CoreError> {
        ensure_positive_amount(amount)?;

        let book = self.book(account_id).await?;
        let reservation = {
            let mut book = book.lock().await;
            if book.entry.balance < amount {
                return Err(CoreError::InsufficientBalance {
                    required: amount,
                    available: book.entry.balance,
                });
            }

            let now = Utc::now();
            let reservation = Reservation {
                id: Uuid::new_v4(),
                account_id,
                amount,
                state: ReservationState::Held,
                created_at: now,
                expires_at: now + hold_for,
                settled_at: None,
            };
            book.entry.balance -= amount;
            book.entry.version += 1;
            book.reservations.insert(reservation.id, reservation.clone());
            reservation
        };

        self.index.write().await.insert(reservation.id, account_id);
        Ok(reservation)
    }

    async fn commit(&self, reservation_id: Uuid) -> Result<Reservation, CoreError> {
        self.settle(reservation_id, ReservationState::Committed).await
    }

    async fn release(&self, reservation_id: Uuid) -> Result<Reservation, CoreError> {
        self.settle(reservation_id, ReservationState::Released).await
    }

    async fn reservation(&self, reservation_id: Uuid) -> Result<Option<Reservation>, CoreError> {
        let book = match self.book_for_reservation(reservation_id).await {
            Ok(book) => book,
            Err(CoreError::ReservationNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let found = book.lock().await.reservations.get(&reservation_id).cloned();
        Ok(found)
    }

    async fn release_expired(&self, now: Timestamp) -> Result<Vec<Reservation>, CoreError> {
        let books: Vec<_> = self.books.read().await.values().cloned().collect();

        let mut released = Vec::new();
        for book in books {
            let mut book = book.lock().await;
            let expired: Vec<Uuid> = book
                .reservations
                .values()
                .filter(|r| r.is_expired(now))
                .map(|r| r.id)
                .collect();
            for id in expired {
                released.push(book.settle(id, ReservationState::Released, now)?);
            }
        }
        Ok(released)
    }
}

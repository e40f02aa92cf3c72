//! Background task that releases reservations whose hold expired.
//!
//! A reservation normally settles when its job finishes or is cancelled. The
//! sweeper is the backstop for reservations whose job never got that far
//! (e.g. the process died between reserve and settle).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use goldrush_core::error::CoreError;
use goldrush_core::ledger::Ledger;
use tokio_util::sync::CancellationToken;

pub struct ReservationSweeper {
    ledger: Arc<dyn Ledger>,
    interval: Duration,
}

impl ReservationSweeper {
    pub fn new(ledger: Arc<dyn Ledger>, interval: Duration) -> Self {
        Self { ledger, interval }
    }

    /// Run until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Reservation sweeper started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Reservation sweeper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        tracing::error!(error = %e, "Reservation sweep failed");
                    }
                }
            }
        }
    }

    /// Release everything expired as of now. Returns how many were released.
    pub async fn sweep_once(&self) -> Result<usize, CoreError> {
        let released = self.ledger.release_expired(Utc::now()).await?;
        for r in &released {
            tracing::warn!(
                reservation_id = %r.id,
                account_id = r.account_id,
                amount = r.amount,
                "Expired reservation released",
            );
        }
        Ok(released.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLedger;

    #[tokio::test]
    async fn sweep_releases_only_expired_holds() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.open_account(1, 100).await.unwrap();
        ledger.reserve(1, 30, chrono::Duration::seconds(-1)).await.unwrap();
        ledger.reserve(1, 20, chrono::Duration::minutes(15)).await.unwrap();

        let sweeper = ReservationSweeper::new(ledger.clone(), Duration::from_secs(30));
        assert_eq!(sweeper.sweep_once().await.unwrap(), 1);
        assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
        assert_eq!(ledger.balance(1).await.unwrap().unwrap().balance, 80);
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let sweeper = ReservationSweeper::new(Arc::new(MemoryLedger::new()), Duration::from_millis(5));
        let cancel = CancellationToken::new();
        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { sweeper.run(cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}

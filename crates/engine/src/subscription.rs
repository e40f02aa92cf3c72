use std::sync::Arc;

use goldrush_core::error::CoreError;
use goldrush_core::job::JobState;
use goldrush_core::plan::PlanTier;
use goldrush_core::types::{DbId, Gold};
use serde::Serialize;

use crate::dispatcher::Dispatcher;
use crate::stores::Stores;

/// Response body of `GET /api/subscription`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub plan: PlanTier,
    pub gold_balance: Gold,
    /// Best live rank among the account's queued jobs.
    pub queue_position: Option<usize>,
}

pub struct SubscriptionService {
    stores: Stores,
    dispatcher: Arc<Dispatcher>,
}

impl SubscriptionService {
    pub fn new(stores: Stores, dispatcher: Arc<Dispatcher>) -> Self {
        Self { stores, dispatcher }
    }

    pub async fn subscription(&self, account_id: DbId) -> Result<Subscription, CoreError> {
        let account = self
            .stores
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Account",
                id: account_id,
            })?;

        let entry = self
            .stores
            .ledger
            .balance(account_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "LedgerEntry",
                id: account_id,
            })?;

        let queued: Vec<DbId> = self
            .stores
            .jobs
            .list_by_account_in_state(account_id, JobState::Queued)
            .await?
            .into_iter()
            .map(|j| j.id)
            .collect();

        Ok(Subscription {
            plan: account.plan,
            gold_balance: entry.balance,
            queue_position: self.dispatcher.best_position(&queued).await,
        })
    }
}

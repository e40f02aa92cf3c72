use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use goldrush_core::error::CoreError;
use goldrush_core::ledger::{Ledger, LedgerEntry};
use goldrush_core::store::{normalize_email, Account, AccountStore, NewAccount};
use goldrush_core::types::{DbId, Gold};
use tokio::sync::RwLock;

use super::MemoryLedger;

/// In-memory account store keyed by id, with a unique email index. Shares
/// the ledger it opens entries on at signup.
pub struct MemoryAccountStore {
    next_id: AtomicI64,
    inner: RwLock<Accounts>,
    ledger: Arc<MemoryLedger>,
}

#[derive(Default)]
struct Accounts {
    by_id: HashMap<DbId, Account>,
    by_email: HashMap<String, DbId>,
}

impl Accounts {
    fn insert(&mut self, id: DbId, input: NewAccount) -> Result<Account, CoreError> {
        let email = normalize_email(&input.email);
        if self.by_email.contains_key(&email) {
            return Err(CoreError::Conflict("User already exists".into()));
        }

        let now = Utc::now();
        let account = Account {
            id,
            email: email.clone(),
            name: input.name,
            password_hash: input.password_hash,
            plan: input.plan,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.by_email.insert(email, account.id);
        self.by_id.insert(account.id, account.clone());
        Ok(account)
    }

    fn remove(&mut self, account: &Account) {
        self.by_email.remove(&account.email);
        self.by_id.remove(&account.id);
    }
}

impl MemoryAccountStore {
    pub fn new(ledger: Arc<MemoryLedger>) -> Self {
        Self {
            next_id: AtomicI64::new(1),
            inner: RwLock::new(Accounts::default()),
            ledger,
        }
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn create(&self, input: NewAccount) -> Result<Account, CoreError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.write().await.insert(id, input)
    }

    async fn create_with_ledger(
        &self,
        input: NewAccount,
        initial_balance: Gold,
    ) -> Result<(Account, LedgerEntry), CoreError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        // Held across the ledger write so no reader sees the account
        // without its entry.
        let mut inner = self.inner.write().await;
        let account = inner.insert(id, input)?;
        match self.ledger.open_account(account.id, initial_balance).await {
            Ok(entry) => Ok((account, entry)),
            Err(e) => {
                inner.remove(&account);
                Err(e)
            }
        }
    }

    async fn deactivate(&self, id: DbId) -> Result<bool, CoreError> {
        let mut inner = self.inner.write().await;
        Ok(match inner.by_id.get_mut(&id) {
            Some(account) => {
                account.is_active = false;
                account.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<Account>, CoreError> {
        Ok(self.inner.read().await.by_id.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, CoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_email
            .get(&normalize_email(email))
            .and_then(|id| inner.by_id.get(id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use goldrush_core::plan::PlanTier;

    use super::*;

    fn new_account(email: &str) -> NewAccount {
        NewAccount {
            email: email.to_string(),
            name: "Ada".to_string(),
            password_hash: "$argon2id$fake".to_string(),
            plan: PlanTier::Free,
        }
    }

    fn store() -> MemoryAccountStore {
        MemoryAccountStore::new(Arc::new(MemoryLedger::new()))
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_case_insensitively() {
        let store = store();
        store.create(new_account("ada@example.com")).await.unwrap();
        let err = store.create(new_account("ADA@example.com")).await.unwrap_err();
        assert_matches!(err, CoreError::Conflict(_));
    }

    #[tokio::test]
    async fn lookup_by_email_and_id() {
        let store = store();
        let created = store.create(new_account("Grace@Example.com")).await.unwrap();
        assert_eq!(created.email, "grace@example.com");
        assert!(created.is_active);

        let by_email = store.find_by_email("grace@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        assert_eq!(store.find_by_id(created.id).await.unwrap(), Some(created));
        assert!(store.find_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_with_ledger_opens_the_entry() {
        let store = store();
        let (account, entry) = store
            .create_with_ledger(new_account("ada@example.com"), 50)
            .await
            .unwrap();
        assert_eq!(entry.account_id, account.id);
        assert_eq!(entry.balance, 50);
        assert_eq!(store.ledger.balance(account.id).await.unwrap(), Some(entry));
    }

    #[tokio::test]
    async fn failed_ledger_open_leaves_no_account() {
        let store = store();
        let err = store
            .create_with_ledger(new_account("ada@example.com"), -1)
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
        assert!(store.find_by_email("ada@example.com").await.unwrap().is_none());

        // The email is free again.
        let (account, _) = store
            .create_with_ledger(new_account("ada@example.com"), 50)
            .await
            .unwrap();
        assert_eq!(store.find_by_id(account.id).await.unwrap(), Some(account));
    }

    #[tokio::test]
    async fn deactivate_disables_the_account() {
        let store = store();
        let account = store.create(new_account("ada@example.com")).await.unwrap();
        assert!(store.deactivate(account.id).await.unwrap());
        assert!(!store.find_by_id(account.id).await.unwrap().unwrap().is_active);
        assert!(!store.deactivate(999).await.unwrap());
    }
}

//! Query service - read-only access to accounts and their history

use std::sync::Arc;

use crate::domain::result::Result;
use crate::domain::{Account, AccountId, Transfer};
use crate::ports::{AccountStore, LedgerStore};

/// Read path; never opens a unit of work
pub struct QueryService<S> {
    store: Arc<S>,
}

impl<S> QueryService<S>
where
    S: AccountStore + LedgerStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Committed state of one account
    pub fn get_account(&self, id: &AccountId) -> Result<Account> {
        self.store.get_account(id)
    }

    /// Transfers touching an account, oldest first
    ///
    /// Fails with `NotFound` for an unknown account rather than returning an
    /// empty history.
    pub fn history_for(&self, id: &AccountId) -> Result<Vec<Transfer>> {
        self.store.get_account(id)?;
        self.store.history_for(id)
    }

    pub fn list_accounts(&self) -> Result<Vec<Account>> {
        self.store.list_accounts()
    }

    pub fn transfer_count(&self) -> Result<u64> {
        self.store.transfer_count()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rust_decimal_macros::dec;

    use super::*;
    use crate::adapters::duckdb::DuckDbRepository;
    use crate::domain::result::ErrorKind;
    use crate::services::{AccountLifecycle, TransferEngine};

    #[test]
    fn test_history_requires_existing_account() {
        let repo = Arc::new(DuckDbRepository::open_in_memory().unwrap());
        repo.ensure_schema().unwrap();
        let query = QueryService::new(Arc::clone(&repo));

        let err = query.history_for(&AccountId::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_history_lists_both_directions() {
        let repo = Arc::new(DuckDbRepository::open_in_memory().unwrap());
        repo.ensure_schema().unwrap();
        let timeout = Duration::from_secs(5);
        let lifecycle = AccountLifecycle::new(Arc::clone(&repo), dec!(100), timeout);
        let engine = TransferEngine::new(Arc::clone(&repo), timeout);
        let query = QueryService::new(Arc::clone(&repo));

        let a = lifecycle.create_account().unwrap().id;
        let b = lifecycle.create_account().unwrap().id;
        assert!(query.history_for(&a).unwrap().is_empty());

        let out = engine.transfer(&a, &b, dec!(5)).unwrap();
        let back = engine.transfer(&b, &a, dec!(2)).unwrap();

        let history = query.history_for(&a).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.contains(&out));
        assert!(history.contains(&back));
        assert!(history[0].timestamp <= history[1].timestamp);
        assert_eq!(query.transfer_count().unwrap(), 2);
        assert_eq!(query.get_account(&a).unwrap().balance, dec!(97));
    }
}

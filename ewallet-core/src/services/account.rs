//! Account lifecycle - wallet creation

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::info;

use crate::domain::result::Result;
use crate::domain::Account;
use crate::ports::{AccountStore, UnitOfWork};

/// Creates accounts holding the configured initial grant
pub struct AccountLifecycle<S> {
    store: Arc<S>,
    initial_balance: Decimal,
    timeout: Duration,
}

impl<S: AccountStore> AccountLifecycle<S> {
    pub fn new(store: Arc<S>, initial_balance: Decimal, timeout: Duration) -> Self {
        Self {
            store,
            initial_balance,
            timeout,
        }
    }

    /// Create and persist a new account
    pub fn create_account(&self) -> Result<Account> {
        let mut uow = self.store.begin(self.timeout)?;
        let account = self.store.create_account(&mut uow, self.initial_balance)?;
        uow.commit()?;

        info!(account_id = %account.id, balance = %account.balance, "account created");
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::adapters::duckdb::DuckDbRepository;
    use crate::domain::result::ErrorKind;

    fn repo() -> Arc<DuckDbRepository> {
        let repo = Arc::new(DuckDbRepository::open_in_memory().unwrap());
        repo.ensure_schema().unwrap();
        repo
    }

    #[test]
    fn test_create_account_with_initial_grant() {
        let repo = repo();
        let lifecycle = AccountLifecycle::new(Arc::clone(&repo), dec!(100), Duration::from_secs(5));

        let account = lifecycle.create_account().unwrap();

        assert_eq!(account.balance, dec!(100));
        assert_eq!(repo.get_account(&account.id).unwrap(), account);
    }

    #[test]
    fn test_ids_are_unique() {
        let repo = repo();
        let lifecycle = AccountLifecycle::new(Arc::clone(&repo), dec!(1), Duration::from_secs(5));

        let a = lifecycle.create_account().unwrap();
        let b = lifecycle.create_account().unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(repo.list_accounts().unwrap().len(), 2);
    }

    #[test]
    fn test_create_times_out() {
        let repo = repo();
        let lifecycle = AccountLifecycle::new(Arc::clone(&repo), dec!(100), Duration::ZERO);

        let err = lifecycle.create_account().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(repo.list_accounts().unwrap().is_empty());
    }
}

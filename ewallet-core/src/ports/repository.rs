//! Store ports - transactional persistence abstraction

use std::time::Duration;

use rust_decimal::Decimal;

use crate::domain::result::Result;
use crate::domain::{Account, AccountId, Transfer};

/// A scoped group of reads and writes that either fully commits or fully rolls back.
///
/// Dropping an unfinished unit of work rolls it back.
pub trait UnitOfWork {
    /// Make every write in this unit durable and visible to other readers
    fn commit(self) -> Result<()>;

    /// Discard every write in this unit
    fn rollback(self) -> Result<()>;

    /// False once a statement has failed or the deadline has passed
    fn is_active(&self) -> bool;
}

/// Backend able to open units of work
pub trait TransactionalStore: Send + Sync {
    type Uow: UnitOfWork;

    /// Open a unit of work that must finish within `timeout`
    fn begin(&self, timeout: Duration) -> Result<Self::Uow>;
}

/// Durable keyed storage of accounts
pub trait AccountStore: TransactionalStore {
    /// Allocate a new id and persist an account holding `initial_balance`
    fn create_account(&self, uow: &mut Self::Uow, initial_balance: Decimal) -> Result<Account>;

    /// Read committed state; fails with `NotFound` if the id is unknown
    fn get_account(&self, id: &AccountId) -> Result<Account>;

    /// Read the latest state as seen from inside `uow`
    fn read_account(&self, uow: &mut Self::Uow, id: &AccountId) -> Result<Option<Account>>;

    /// Overwrite the balance of an existing account inside `uow`
    fn update_balance(&self, uow: &mut Self::Uow, id: &AccountId, new_balance: Decimal) -> Result<()>;

    /// All accounts, oldest first
    fn list_accounts(&self) -> Result<Vec<Account>>;
}

/// Append-only storage of transfers
pub trait LedgerStore: TransactionalStore {
    /// Record a transfer inside `uow`
    fn append_transfer(&self, uow: &mut Self::Uow, transfer: &Transfer) -> Result<()>;

    /// Transfers touching the account, ascending by timestamp then id
    fn history_for(&self, account_id: &AccountId) -> Result<Vec<Transfer>>;

    /// Number of recorded transfers
    fn transfer_count(&self) -> Result<u64>;
}

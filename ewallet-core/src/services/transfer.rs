//! Transfer engine - the atomic write path for moving money
//!
//! A transfer is two balance updates plus one ledger entry, written inside a
//! single unit of work. Both accounts are read inside that unit of work, so
//! the funds check and the writes see the same snapshot; the backend aborts
//! whichever of two racing transfers commits second.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::domain::result::{Error, Result};
use crate::domain::{validate_amount, Account, AccountId, AccountRole, Transfer, MAX_AMOUNT};
use crate::ports::{AccountStore, LedgerStore, UnitOfWork};

/// Moves money between accounts
pub struct TransferEngine<S> {
    store: Arc<S>,
    timeout: Duration,
}

impl<S> TransferEngine<S>
where
    S: AccountStore + LedgerStore,
{
    pub fn new(store: Arc<S>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Move `amount` from one account to another and record it in the ledger.
    ///
    /// Either both balances change and the transfer is recorded, or nothing
    /// is persisted. Conflicts with a concurrent transfer and deadline aborts
    /// come back as retryable errors.
    pub fn transfer(&self, from: &AccountId, to: &AccountId, amount: Decimal) -> Result<Transfer> {
        let amount = validate_amount(amount)?;
        if from == to {
            return Err(Error::InvalidRequest(format!(
                "cannot transfer from account {} to itself",
                from
            )));
        }

        let mut uow = self.store.begin(self.timeout)?;
        let result = self.transfer_in(&mut uow, from, to, amount);

        match result {
            Ok(transfer) => {
                uow.commit().map_err(|e| {
                    log_abort(&e, from, to);
                    e
                })?;
                info!(
                    transfer_id = %transfer.id,
                    from = %from,
                    to = %to,
                    amount = %amount,
                    "transfer committed"
                );
                Ok(transfer)
            }
            Err(e) => {
                if uow.is_active() {
                    if let Err(rollback_err) = uow.rollback() {
                        warn!(error = %rollback_err, "rollback after failed transfer failed");
                    }
                }
                log_abort(&e, from, to);
                Err(e)
            }
        }
    }

    fn transfer_in(
        &self,
        uow: &mut S::Uow,
        from: &AccountId,
        to: &AccountId,
        amount: Decimal,
    ) -> Result<Transfer> {
        let (source, destination) = self.read_pair(uow, from, to)?;

        let debited = source
            .balance_after_debit(amount)
            .ok_or(Error::InsufficientFunds {
                account: source.id,
                balance: source.balance,
                requested: amount,
            })?;
        let credited = destination
            .balance_after_credit(amount)
            .filter(|balance| *balance <= MAX_AMOUNT)
            .ok_or_else(|| {
                Error::invalid_amount(format!(
                    "crediting {} would exceed the maximum balance of account {}",
                    amount, destination.id
                ))
            })?;

        // Same canonical order as the reads
        let mut updates = [(source.id, debited), (destination.id, credited)];
        updates.sort_by_key(|(id, _)| *id);
        for (id, balance) in &updates {
            self.store.update_balance(uow, id, *balance)?;
        }

        let transfer = Transfer::new(*from, *to, amount);
        self.store.append_transfer(uow, &transfer)?;
        Ok(transfer)
    }

    /// Read source and destination inside the unit of work, in ascending id order
    fn read_pair(
        &self,
        uow: &mut S::Uow,
        from: &AccountId,
        to: &AccountId,
    ) -> Result<(Account, Account)> {
        let (first, second) = if from < to { (from, to) } else { (to, from) };
        let first = self.store.read_account(uow, first)?;
        let second = self.store.read_account(uow, second)?;
        let (source, destination) = if from < to { (first, second) } else { (second, first) };

        let source = source.ok_or_else(|| Error::account_not_found(AccountRole::Source, from))?;
        let destination =
            destination.ok_or_else(|| Error::account_not_found(AccountRole::Destination, to))?;
        debug!(
            from = %from,
            to = %to,
            source_balance = %source.balance,
            destination_balance = %destination.balance,
            "read transfer accounts"
        );
        Ok((source, destination))
    }
}

fn log_abort(err: &Error, from: &AccountId, to: &AccountId) {
    match err {
        Error::Conflict(_) => warn!(from = %from, to = %to, "transfer aborted by concurrent update"),
        Error::Timeout(limit) => {
            warn!(from = %from, to = %to, timeout_ms = limit.as_millis() as u64, "transfer timed out")
        }
        other => debug!(from = %from, to = %to, error = %other, "transfer rejected"),
    }
}

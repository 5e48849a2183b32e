//! DuckDB repository implementation
//!
//! One [`DuckDbRepository`] owns the database handle. Every unit of work runs
//! on its own connection cloned from that handle, so concurrent units of work
//! are isolated by DuckDB's MVCC: each sees a snapshot taken at `BEGIN`, and a
//! write to a row that another transaction changed after that snapshot aborts
//! with a conflict. Transfers write every row they read, which makes that
//! snapshot isolation serializable for them.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use duckdb::{params, Connection};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::amount::to_storage_string;
use crate::domain::result::{Error, Result};
use crate::domain::{Account, AccountId, AccountRole, Transfer, TransferId};
use crate::ports::{AccountStore, LedgerStore, TransactionalStore, UnitOfWork};
use crate::services::MigrationService;

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

const SELECT_ACCOUNT: &str = "SELECT account_id, CAST(balance AS VARCHAR), CAST(created_at AS VARCHAR)
     FROM accounts";

const SELECT_TRANSFER: &str = "SELECT transfer_id, CAST(created_at AS VARCHAR), from_account, to_account,
            CAST(amount AS VARCHAR)
     FROM transfers";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_open_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("could not set lock on file")
        || lower.contains("database is locked")
}

/// DuckDB repository implementation
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbRepository {
    /// Open (or create) a file-backed database
    ///
    /// Retries with exponential backoff while another process holds the
    /// database file lock.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut attempt = 0;
        loop {
            match Self::try_open_connection(Some(db_path)) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if !is_retryable_open_error(&err_msg) || attempt + 1 >= MAX_RETRIES {
                        return Err(e);
                    }
                    let delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                    warn!(
                        path = %db_path.display(),
                        attempt = attempt + 1,
                        max_attempts = MAX_RETRIES,
                        delay_ms = delay.as_millis() as u64,
                        error = %err_msg,
                        "database busy, retrying"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }

    /// Open a private in-memory database (used by tests and dry runs)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Self::try_open_connection(None)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: Option<&Path>) -> Result<Connection> {
        // Extension autoloading stays off: nothing here needs extensions and
        // cached ones in ~/.duckdb can fail code signing checks on macOS.
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = match db_path {
            Some(path) => Connection::open_with_flags(path, config)?,
            None => Connection::open_in_memory_with_flags(config)?,
        };
        Ok(conn)
    }

    /// Path of the database file, `None` for in-memory databases
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Run database migrations using the MigrationService
    pub fn run_migrations(&self) -> Result<crate::services::MigrationResult> {
        let conn = self.conn()?;
        MigrationService::new(&conn).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    /// Lock the shared connection (migrations and connection cloning only)
    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::database("database connection lock poisoned"))
    }

    /// Clone a fresh connection; the shared lock is released on return
    fn clone_conn(&self) -> Result<Connection> {
        let conn = self.conn()?.try_clone()?;
        Ok(conn)
    }

    /// Run an autocommit read on its own connection.
    ///
    /// Reads never hold the shared lock while querying, so a slow read does
    /// not stall writers opening a unit of work.
    pub(crate) fn with_reader<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> duckdb::Result<T>,
    {
        let conn = self.clone_conn()?;
        Ok(f(&conn)?)
    }

    // === Health checks ===
    //
    // These take a unit of work so that a whole check run reads one snapshot.

    /// Accounts holding a negative balance
    pub fn negative_balances(&self, uow: &mut DuckDbUnitOfWork) -> Result<Vec<AccountBalance>> {
        let rows = uow.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT account_id, CAST(balance AS VARCHAR) FROM accounts
                 WHERE balance < 0 ORDER BY account_id",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
            rows.collect::<duckdb::Result<Vec<_>>>()
        })?;

        rows.into_iter()
            .map(|(account_id, balance)| {
                Ok(AccountBalance {
                    account_id,
                    balance: parse_decimal(&balance)?,
                })
            })
            .collect()
    }

    /// Accounts whose balance differs from opening balance plus net ledger flow
    pub fn ledger_discrepancies(
        &self,
        uow: &mut DuckDbUnitOfWork,
    ) -> Result<Vec<BalanceDiscrepancy>> {
        let rows = uow.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "WITH inflow AS (
                     SELECT to_account AS account_id, SUM(amount) AS total
                     FROM transfers GROUP BY to_account
                 ),
                 outflow AS (
                     SELECT from_account AS account_id, SUM(amount) AS total
                     FROM transfers GROUP BY from_account
                 ),
                 replay AS (
                     SELECT a.account_id,
                            a.opening_balance + COALESCE(i.total, 0) - COALESCE(o.total, 0) AS expected,
                            a.balance AS actual
                     FROM accounts a
                     LEFT JOIN inflow i ON i.account_id = a.account_id
                     LEFT JOIN outflow o ON o.account_id = a.account_id
                 )
                 SELECT account_id, CAST(expected AS VARCHAR), CAST(actual AS VARCHAR)
                 FROM replay
                 WHERE expected <> actual
                 ORDER BY account_id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;
            rows.collect::<duckdb::Result<Vec<_>>>()
        })?;

        rows.into_iter()
            .map(|(account_id, expected, actual)| {
                Ok(BalanceDiscrepancy {
                    account_id,
                    expected: parse_decimal(&expected)?,
                    actual: parse_decimal(&actual)?,
                })
            })
            .collect()
    }

    /// Transfers whose source or destination account does not exist
    pub fn orphaned_transfers(&self, uow: &mut DuckDbUnitOfWork) -> Result<Vec<TransferEnds>> {
        uow.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.transfer_id, t.from_account, t.to_account
                 FROM transfers t
                 WHERE NOT EXISTS (SELECT 1 FROM accounts a WHERE a.account_id = t.from_account)
                    OR NOT EXISTS (SELECT 1 FROM accounts a WHERE a.account_id = t.to_account)
                 ORDER BY t.created_at, t.transfer_id",
            )?;
            let rows = stmt.query_map([], row_to_transfer_ends)?;
            rows.collect()
        })
    }

    /// Ledger entries that move money from an account to itself
    pub fn self_transfers(&self, uow: &mut DuckDbUnitOfWork) -> Result<Vec<TransferEnds>> {
        uow.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT transfer_id, from_account, to_account FROM transfers
                 WHERE from_account = to_account
                 ORDER BY created_at, transfer_id",
            )?;
            let rows = stmt.query_map([], row_to_transfer_ends)?;
            rows.collect()
        })
    }

    /// Sum of current balances and sum of opening balances across all accounts
    pub fn supply_totals(&self, uow: &mut DuckDbUnitOfWork) -> Result<SupplyTotals> {
        let (current, opening) = uow.with_conn(|conn| {
            conn.query_row(
                "SELECT CAST(COALESCE(SUM(balance), 0) AS VARCHAR),
                        CAST(COALESCE(SUM(opening_balance), 0) AS VARCHAR)
                 FROM accounts",
                [],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
        })?;
        Ok(SupplyTotals {
            current: parse_decimal(&current)?,
            opening: parse_decimal(&opening)?,
        })
    }
}

impl TransactionalStore for DuckDbRepository {
    type Uow = DuckDbUnitOfWork;

    fn begin(&self, timeout: Duration) -> Result<DuckDbUnitOfWork> {
        DuckDbUnitOfWork::begin(self.clone_conn()?, timeout)
    }
}

impl AccountStore for DuckDbRepository {
    fn create_account(&self, uow: &mut DuckDbUnitOfWork, initial_balance: Decimal) -> Result<Account> {
        let account = Account::new(AccountId::new(), initial_balance, Utc::now().trunc_subsecs(6));
        let balance = to_storage_string(initial_balance);
        uow.with_conn(|conn| {
            conn.execute(
                "INSERT INTO accounts (account_id, balance, opening_balance, created_at)
                 VALUES (?, CAST(? AS DECIMAL(18, 4)), CAST(? AS DECIMAL(18, 4)), CAST(? AS TIMESTAMP))",
                params![
                    account.id.to_string(),
                    balance,
                    balance,
                    to_sql_timestamp(&account.created_at),
                ],
            )
        })?;
        Ok(account)
    }

    fn get_account(&self, id: &AccountId) -> Result<Account> {
        match self.with_reader(|conn| query_account(conn, id))? {
            Some(row) => row.into_account(),
            None => Err(Error::account_not_found(AccountRole::Account, id)),
        }
    }

    fn read_account(&self, uow: &mut DuckDbUnitOfWork, id: &AccountId) -> Result<Option<Account>> {
        uow.with_conn(|conn| query_account(conn, id))?
            .map(AccountRow::into_account)
            .transpose()
    }

    fn update_balance(
        &self,
        uow: &mut DuckDbUnitOfWork,
        id: &AccountId,
        new_balance: Decimal,
    ) -> Result<()> {
        let updated = uow.with_conn(|conn| {
            conn.execute(
                "UPDATE accounts SET balance = CAST(? AS DECIMAL(18, 4)) WHERE account_id = ?",
                params![to_storage_string(new_balance), id.to_string()],
            )
        })?;
        if updated == 0 {
            return Err(Error::account_not_found(AccountRole::Account, id));
        }
        Ok(())
    }

    fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows = self.with_reader(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} ORDER BY created_at, account_id",
                SELECT_ACCOUNT
            ))?;
            let rows = stmt.query_map([], row_to_account_row)?;
            rows.collect::<duckdb::Result<Vec<_>>>()
        })?;
        rows.into_iter().map(AccountRow::into_account).collect()
    }
}

impl LedgerStore for DuckDbRepository {
    fn append_transfer(&self, uow: &mut DuckDbUnitOfWork, transfer: &Transfer) -> Result<()> {
        uow.with_conn(|conn| {
            conn.execute(
                "INSERT INTO transfers (transfer_id, created_at, from_account, to_account, amount)
                 VALUES (?, CAST(? AS TIMESTAMP), ?, ?, CAST(? AS DECIMAL(18, 4)))",
                params![
                    transfer.id.to_string(),
                    to_sql_timestamp(&transfer.timestamp),
                    transfer.from.to_string(),
                    transfer.to.to_string(),
                    to_storage_string(transfer.amount),
                ],
            )
        })?;
        Ok(())
    }

    fn history_for(&self, account_id: &AccountId) -> Result<Vec<Transfer>> {
        let id = account_id.to_string();
        let rows = self.with_reader(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE from_account = ? OR to_account = ? ORDER BY created_at ASC, transfer_id ASC",
                SELECT_TRANSFER
            ))?;
            let rows = stmt.query_map(params![id, id], row_to_transfer_row)?;
            rows.collect::<duckdb::Result<Vec<_>>>()
        })?;
        rows.into_iter().map(TransferRow::into_transfer).collect()
    }

    fn transfer_count(&self) -> Result<u64> {
        let count: i64 = self.with_reader(|conn| {
            conn.query_row("SELECT COUNT(*) FROM transfers", [], |row| row.get(0))
        })?;
        Ok(count.max(0) as u64)
    }
}

// === Unit of work ===

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UowState {
    Active,
    Failed,
    TimedOut,
    Committed,
    RolledBack,
}

/// A DuckDB transaction on a dedicated connection, bounded by a deadline
pub struct DuckDbUnitOfWork {
    conn: Connection,
    timeout: Duration,
    deadline: Instant,
    state: UowState,
}

impl DuckDbUnitOfWork {
    fn begin(conn: Connection, timeout: Duration) -> Result<Self> {
        conn.execute_batch("BEGIN TRANSACTION")?;
        debug!(timeout_ms = timeout.as_millis() as u64, "unit of work opened");
        Ok(Self {
            conn,
            timeout,
            deadline: Instant::now() + timeout,
            state: UowState::Active,
        })
    }

    /// Run statements on the transaction's connection.
    ///
    /// Any backend failure poisons the unit of work: DuckDB aborts the
    /// transaction, so later statements are refused until it is dropped.
    pub fn with_conn<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> duckdb::Result<T>,
    {
        self.ensure_active()?;
        match f(&self.conn) {
            Ok(value) => Ok(value),
            Err(e) => {
                self.state = UowState::Failed;
                let err = Error::from(e);
                debug!(error = %err, "statement failed, unit of work aborted");
                Err(err)
            }
        }
    }

    fn ensure_active(&mut self) -> Result<()> {
        match self.state {
            UowState::Active if Instant::now() >= self.deadline => {
                self.abort_on_deadline();
                Err(Error::Timeout(self.timeout))
            }
            UowState::Active => Ok(()),
            UowState::TimedOut => Err(Error::Timeout(self.timeout)),
            UowState::Failed => Err(Error::precondition(
                "unit of work was aborted by an earlier failure",
            )),
            UowState::Committed | UowState::RolledBack => {
                Err(Error::precondition("unit of work is already finished"))
            }
        }
    }

    fn abort_on_deadline(&mut self) {
        warn!(timeout_ms = self.timeout.as_millis() as u64, "unit of work deadline exceeded, rolling back");
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            warn!(error = %e, "rollback after deadline failed");
        }
        self.state = UowState::TimedOut;
    }
}

impl UnitOfWork for DuckDbUnitOfWork {
    fn commit(mut self) -> Result<()> {
        self.ensure_active()?;
        match self.conn.execute_batch("COMMIT") {
            Ok(()) => {
                self.state = UowState::Committed;
                debug!("unit of work committed");
                Ok(())
            }
            Err(e) => {
                // Leave the state as Failed so Drop issues the rollback
                self.state = UowState::Failed;
                Err(Error::from(e))
            }
        }
    }

    fn rollback(mut self) -> Result<()> {
        match self.state {
            UowState::Committed | UowState::RolledBack | UowState::TimedOut => Ok(()),
            UowState::Active | UowState::Failed => {
                self.state = UowState::RolledBack;
                self.conn.execute_batch("ROLLBACK")?;
                debug!("unit of work rolled back");
                Ok(())
            }
        }
    }

    fn is_active(&self) -> bool {
        self.state == UowState::Active && Instant::now() < self.deadline
    }
}

impl Drop for DuckDbUnitOfWork {
    fn drop(&mut self) {
        if matches!(self.state, UowState::Active | UowState::Failed) {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                // A failed COMMIT may already have ended the transaction
                debug!(error = %e, "rollback on drop failed");
            } else {
                debug!("unit of work rolled back on drop");
            }
        }
    }
}

// === Row mapping ===

struct AccountRow {
    id: String,
    balance: String,
    created_at: String,
}

impl AccountRow {
    fn into_account(self) -> Result<Account> {
        let id = AccountId::from_str(&self.id)
            .map_err(|e| Error::database(format!("corrupt account id '{}': {}", self.id, e)))?;
        Ok(Account::new(
            id,
            parse_decimal(&self.balance)?,
            parse_sql_timestamp(&self.created_at)?,
        ))
    }
}

struct TransferRow {
    id: String,
    created_at: String,
    from: String,
    to: String,
    amount: String,
}

impl TransferRow {
    fn into_transfer(self) -> Result<Transfer> {
        let corrupt = |what: &str, value: &str| {
            Error::database(format!("corrupt {} '{}' in transfer {}", what, value, self.id))
        };
        Ok(Transfer {
            id: TransferId::from_str(&self.id).map_err(|_| corrupt("transfer id", &self.id))?,
            timestamp: parse_sql_timestamp(&self.created_at)?,
            from: AccountId::from_str(&self.from).map_err(|_| corrupt("source id", &self.from))?,
            to: AccountId::from_str(&self.to).map_err(|_| corrupt("destination id", &self.to))?,
            amount: parse_decimal(&self.amount)?,
        })
    }
}

fn query_account(conn: &Connection, id: &AccountId) -> duckdb::Result<Option<AccountRow>> {
    let sql = format!("{} WHERE account_id = ?", SELECT_ACCOUNT);
    match conn.query_row(&sql, params![id.to_string()], row_to_account_row) {
        Ok(row) => Ok(Some(row)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

fn row_to_account_row(row: &duckdb::Row) -> duckdb::Result<AccountRow> {
    Ok(AccountRow {
        id: row.get(0)?,
        balance: row.get(1)?,
        created_at: row.get(2)?,
    })
}

fn row_to_transfer_row(row: &duckdb::Row) -> duckdb::Result<TransferRow> {
    Ok(TransferRow {
        id: row.get(0)?,
        created_at: row.get(1)?,
        from: row.get(2)?,
        to: row.get(3)?,
        amount: row.get(4)?,
    })
}

fn row_to_transfer_ends(row: &duckdb::Row) -> duckdb::Result<TransferEnds> {
    Ok(TransferEnds {
        transfer_id: row.get(0)?,
        from_account: row.get(1)?,
        to_account: row.get(2)?,
    })
}

/// Account id paired with its balance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountBalance {
    pub account_id: String,
    pub balance: Decimal,
}

/// An account whose stored balance disagrees with a replay of the ledger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceDiscrepancy {
    pub account_id: String,
    pub expected: Decimal,
    pub actual: Decimal,
}

/// Both ends of a recorded transfer, as stored
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferEnds {
    pub transfer_id: String,
    pub from_account: String,
    pub to_account: String,
}

/// Total money held now versus total money ever granted
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SupplyTotals {
    pub current: Decimal,
    pub opening: Decimal,
}

// Helper functions

/// Format a UTC time the way `CAST(? AS TIMESTAMP)` expects it
pub(crate) fn to_sql_timestamp(ts: &DateTime<Utc>) -> String {
    ts.naive_utc().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Parse a `TIMESTAMP` rendered by `CAST(... AS VARCHAR)`
fn parse_sql_timestamp(s: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::database(format!("corrupt timestamp '{}': {}", s, e)))
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str(s.trim())
        .map(|d| d.normalize())
        .map_err(|e| Error::database(format!("corrupt decimal '{}': {}", s, e)))
}

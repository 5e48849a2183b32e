//! EWallet Core - a consistent ledger for wallet balances and transfers
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Account, Transfer, amounts, errors)
//! - **ports**: Trait definitions for storage (AccountStore, LedgerStore, UnitOfWork)
//! - **services**: Business logic orchestration (TransferEngine, AccountLifecycle, etc.)
//! - **adapters**: Concrete implementations (DuckDB)

pub mod domain;
pub mod ports;
pub mod services;
pub mod adapters;
pub mod config;
pub mod migrations;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::debug;

use adapters::duckdb::DuckDbRepository;
use config::Config;
use services::*;

// Re-export commonly used types at crate root
pub use domain::{Account, AccountId, AccountRole, Transfer, TransferId};
pub use domain::result::{Error, ErrorKind, OperationResult, Result};
pub use services::RetryPolicy;

/// Main context for wallet operations
///
/// This is the primary entry point for all business logic. It holds
/// the database connection, configuration, and all services.
pub struct WalletContext {
    pub config: Config,
    pub repository: Arc<DuckDbRepository>,
    pub lifecycle: AccountLifecycle<DuckDbRepository>,
    pub engine: TransferEngine<DuckDbRepository>,
    pub query_service: QueryService<DuckDbRepository>,
    pub doctor_service: DoctorService,
}

impl WalletContext {
    /// Open the wallet stored in `wallet_dir`, creating it if needed
    pub fn new(wallet_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(wallet_dir)
            .with_context(|| format!("cannot create data directory {}", wallet_dir.display()))?;
        let config = Config::load(wallet_dir).context("failed to load settings")?;

        let db_path = wallet_dir.join(&config.database_file);
        let repository = DuckDbRepository::new(&db_path)
            .with_context(|| format!("failed to open database {}", db_path.display()))?;
        debug!(path = ?repository.db_path(), "database opened");

        Self::with_repository(config, repository)
    }

    fn with_repository(config: Config, repository: DuckDbRepository) -> anyhow::Result<Self> {
        let repository = Arc::new(repository);

        // Initialize schema
        repository.ensure_schema().context("failed to apply schema migrations")?;

        // Create services
        let timeout = config.unit_of_work_timeout;
        let lifecycle = AccountLifecycle::new(Arc::clone(&repository), config.initial_balance, timeout);
        let engine = TransferEngine::new(Arc::clone(&repository), timeout);
        let query_service = QueryService::new(Arc::clone(&repository));
        let doctor_service = DoctorService::new(Arc::clone(&repository), timeout);

        Ok(Self {
            config,
            repository,
            lifecycle,
            engine,
            query_service,
            doctor_service,
        })
    }
}

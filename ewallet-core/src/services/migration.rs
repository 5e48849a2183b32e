//! Migration service - manages database schema migrations
//!
//! Migrations are SQL files embedded at compile time. Each migration is
//! applied in its own database transaction together with the row that
//! records it in `sys_migrations`, so a crash mid-migration leaves nothing
//! half-applied.

use std::collections::HashSet;

use chrono::Utc;
use duckdb::{params, Connection};
use tracing::{debug, info};

use crate::adapters::duckdb::to_sql_timestamp;
use crate::domain::result::{Error, Result};
use crate::migrations::MIGRATIONS;

/// Result of running migrations
#[derive(Debug)]
pub struct MigrationResult {
    /// Names of newly applied migrations
    pub applied: Vec<String>,
    /// Count of migrations that were already applied
    pub already_applied: usize,
}

/// Service for managing database migrations
pub struct MigrationService<'a> {
    conn: &'a Connection,
}

impl<'a> MigrationService<'a> {
    /// Create a new migration service with a database connection
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Run all pending migrations in order
    pub fn run_pending(&self) -> Result<MigrationResult> {
        // The bookkeeping migration is idempotent DDL; running it first means
        // `get_applied` always has a table to read.
        let (bootstrap_name, bootstrap_sql) = MIGRATIONS[0];
        self.conn.execute_batch(bootstrap_sql)?;

        let applied: HashSet<String> = self.get_applied()?.into_iter().collect();
        let already_applied = applied.len();

        let mut newly_applied = Vec::new();
        for (name, sql) in MIGRATIONS.iter() {
            if applied.contains(*name) {
                continue;
            }
            if *name == bootstrap_name {
                self.record_migration(name)?;
            } else {
                self.apply(name, sql)?;
            }
            info!(migration = *name, "applied schema migration");
            newly_applied.push(name.to_string());
        }

        debug!(
            applied = newly_applied.len(),
            already_applied, "schema is up to date"
        );
        Ok(MigrationResult {
            applied: newly_applied,
            already_applied,
        })
    }

    /// Get list of already applied migration names
    pub fn get_applied(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT migration_name FROM sys_migrations ORDER BY migration_name")?;
        let names = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut result = Vec::new();
        for name in names {
            result.push(name?);
        }
        Ok(result)
    }

    /// Get list of pending migration names
    pub fn get_pending(&self) -> Result<Vec<String>> {
        let applied = self.get_applied()?;
        Ok(MIGRATIONS
            .iter()
            .filter(|(name, _)| !applied.iter().any(|a| a.as_str() == *name))
            .map(|(name, _)| name.to_string())
            .collect())
    }

    fn apply(&self, name: &str, sql: &str) -> Result<()> {
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        let outcome = self
            .conn
            .execute_batch(sql)
            .map_err(Error::from)
            .and_then(|_| self.record_migration(name));
        match outcome {
            Ok(()) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(())
            }
            Err(e) => {
                self.conn.execute_batch("ROLLBACK")?;
                Err(e)
            }
        }
    }

    fn record_migration(&self, name: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sys_migrations (migration_name, applied_at) VALUES (?, CAST(? AS TIMESTAMP))",
            params![name, to_sql_timestamp(&Utc::now())],
        )?;
        Ok(())
    }
}

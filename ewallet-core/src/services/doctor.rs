//! Doctor service - ledger health checks

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::Result;
use crate::ports::{TransactionalStore, UnitOfWork};

/// Doctor service for health checks
pub struct DoctorService {
    repository: Arc<DuckDbRepository>,
    timeout: Duration,
}

impl DoctorService {
    pub fn new(repository: Arc<DuckDbRepository>, timeout: Duration) -> Self {
        Self { repository, timeout }
    }

    /// Run all health checks against one consistent snapshot
    pub fn run_checks(&self) -> Result<DoctorResult> {
        let mut uow = self.repository.begin(self.timeout)?;
        let mut checks = HashMap::new();

        // Negative balances
        let negative = self.repository.negative_balances(&mut uow)?;
        checks.insert(
            "negative_balances".to_string(),
            CheckResult::from_findings(
                &negative,
                "error",
                "No account holds a negative balance".to_string(),
                format!("{} account(s) hold a negative balance", negative.len()),
                |b| json!({"account_id": b.account_id, "balance": b.balance.to_string()}),
            ),
        );

        // Ledger replay - opening balance plus net transfers must match
        let discrepancies = self.repository.ledger_discrepancies(&mut uow)?;
        checks.insert(
            "ledger_replay".to_string(),
            CheckResult::from_findings(
                &discrepancies,
                "error",
                "Every balance matches its ledger history".to_string(),
                format!("{} account(s) disagree with their ledger history", discrepancies.len()),
                |d| {
                    json!({
                        "account_id": d.account_id,
                        "expected": d.expected.to_string(),
                        "actual": d.actual.to_string()
                    })
                },
            ),
        );

        // Orphaned transfers
        let orphaned = self.repository.orphaned_transfers(&mut uow)?;
        checks.insert(
            "orphaned_transfers".to_string(),
            CheckResult::from_findings(
                &orphaned,
                "error",
                "No orphaned transfers found".to_string(),
                format!("{} transfer(s) reference missing accounts", orphaned.len()),
                |t| {
                    json!({
                        "transfer_id": t.transfer_id,
                        "from_account": t.from_account,
                        "to_account": t.to_account
                    })
                },
            ),
        );

        // Self transfers are rejected today but may exist in older data
        let self_transfers = self.repository.self_transfers(&mut uow)?;
        checks.insert(
            "self_transfers".to_string(),
            CheckResult::from_findings(
                &self_transfers,
                "warning",
                "No self transfers recorded".to_string(),
                format!("{} transfer(s) move money from an account to itself", self_transfers.len()),
                |t| json!({"transfer_id": t.transfer_id, "account_id": t.from_account}),
            ),
        );

        // Supply conservation
        let totals = self.repository.supply_totals(&mut uow)?;
        let conserved = totals.current == totals.opening;
        checks.insert(
            "supply_conservation".to_string(),
            CheckResult {
                status: if conserved { "pass" } else { "error" }.to_string(),
                message: if conserved {
                    format!("Total supply of {} is conserved", totals.current)
                } else {
                    format!(
                        "Total balances {} differ from total grants {}",
                        totals.current, totals.opening
                    )
                },
                details: if conserved {
                    None
                } else {
                    Some(vec![json!({
                        "current": totals.current.to_string(),
                        "opening": totals.opening.to_string()
                    })])
                },
            },
        );

        // Nothing was written; a failed rollback does not invalidate the results
        if let Err(e) = uow.rollback() {
            warn!(error = %e, "failed to close health check snapshot");
        }

        // Calculate summary
        let passed = checks.values().filter(|c| c.status == "pass").count() as i64;
        let warnings = checks.values().filter(|c| c.status == "warning").count() as i64;
        let errors = checks.values().filter(|c| c.status == "error").count() as i64;
        info!(passed, warnings, errors, "health checks finished");

        Ok(DoctorResult {
            checks,
            summary: DoctorSummary {
                passed,
                warnings,
                errors,
            },
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorResult {
    pub checks: HashMap<String, CheckResult>,
    pub summary: DoctorSummary,
}

impl DoctorResult {
    pub fn is_healthy(&self) -> bool {
        self.summary.errors == 0
    }
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<serde_json::Value>>,
}

impl CheckResult {
    fn from_findings<T>(
        findings: &[T],
        failure_status: &str,
        pass_message: String,
        failure_message: String,
        detail: impl Fn(&T) -> serde_json::Value,
    ) -> Self {
        if findings.is_empty() {
            Self {
                status: "pass".to_string(),
                message: pass_message,
                details: None,
            }
        } else {
            Self {
                status: failure_status.to_string(),
                message: failure_message,
                details: Some(findings.iter().map(detail).collect()),
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorSummary {
    pub passed: i64,
    pub warnings: i64,
    pub errors: i64,
}

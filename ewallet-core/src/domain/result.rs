//! Result and error types for the core library

use std::collections::HashMap;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{AccountId, AccountRole};

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{role} not found: {id}")]
    AccountNotFound { role: AccountRole, id: String },

    #[error("Insufficient funds in account {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account: AccountId,
        balance: Decimal,
        requested: Decimal,
    },

    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    #[error("Database error: {0}")]
    Database(String),

    /// Write-write conflict reported by the backend; the whole unit of work was aborted.
    #[error("Database conflict: {0}")]
    Conflict(String),

    #[error("Unit of work exceeded its deadline of {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of [`Error`] used by front ends to pick a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidAmount,
    InvalidRequest,
    NotFound,
    InsufficientFunds,
    PreconditionViolation,
    Storage,
    Timeout,
    Config,
}

impl Error {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create an invalid amount error
    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::InvalidAmount(msg.into())
    }

    /// Create a precondition violation
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionViolation(msg.into())
    }

    /// Create a not found error for an account supplied in the given role
    pub fn account_not_found(role: AccountRole, id: impl ToString) -> Self {
        Self::AccountNotFound {
            role,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidAmount(_) => ErrorKind::InvalidAmount,
            Error::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Error::AccountNotFound { .. } => ErrorKind::NotFound,
            Error::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Error::PreconditionViolation(_) => ErrorKind::PreconditionViolation,
            Error::Database(_) | Error::Conflict(_) | Error::Io(_) | Error::Json(_) => {
                ErrorKind::Storage
            }
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether a caller may safely resubmit the operation that produced this error.
    ///
    /// Nothing is observable before commit, so conflicts and deadline aborts can be
    /// retried from scratch. Validation and funds errors need the caller to change something.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict(_) | Error::Timeout(_))
    }
}

impl From<duckdb::Error> for Error {
    fn from(err: duckdb::Error) -> Self {
        let msg = err.to_string();
        if is_conflict_message(&msg) {
            Self::Conflict(msg)
        } else {
            Self::Database(msg)
        }
    }
}

/// DuckDB reports optimistic concurrency failures as "TransactionContext Error: Conflict on ..."
fn is_conflict_message(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    lower.contains("transactioncontext error") && lower.contains("conflict")
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Operation result envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<HashMap<String, serde_json::Value>>,
}

impl<T> OperationResult<T> {
    /// Create a successful result
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
            context: None,
        }
    }

    /// Create a failed result
    pub fn fail(error: &Error) -> Self {
        let mut context = HashMap::new();
        context.insert(
            "retryable".to_string(),
            serde_json::Value::Bool(error.is_retryable()),
        );
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            context: Some(context),
        }
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::fail(&e),
        }
    }
}

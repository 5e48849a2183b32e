//! CLI command implementations

pub mod doctor;
pub mod history;
pub mod list;
pub mod new;
pub mod send;
pub mod show;

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use ewallet_core::{OperationResult, WalletContext};

use crate::output;

/// Environment variable overriding the data directory
const DIR_ENV: &str = "EWALLET_DIR";

/// Get the data directory from environment or default
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir()
        .with_context(|| format!("Could not find home directory; set {} instead", DIR_ENV))?;
    Ok(home.join(".ewallet"))
}

/// Open the wallet context for the data directory
pub fn get_context() -> Result<WalletContext> {
    let data_dir = get_data_dir()?;
    debug!(dir = %data_dir.display(), "using data directory");
    WalletContext::new(&data_dir)
        .with_context(|| format!("Failed to open wallet data in {}", data_dir.display()))
}

/// Print the JSON envelope when asked to, and pass the value on for
/// human-readable rendering otherwise
pub fn finish<T: Serialize>(json: bool, result: ewallet_core::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) if json => {
            output::print_json(&OperationResult::ok(&value))?;
            Ok(None)
        }
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            if json {
                output::print_json(&OperationResult::<T>::fail(&e))?;
            }
            Err(e.into())
        }
    }
}

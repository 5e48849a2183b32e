//! Output formatting utilities

use chrono::{DateTime, Utc};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use serde::Serialize;

use ewallet_core::{Account, OperationResult, Transfer};

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Wire timestamp format, second precision
pub fn format_time(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Print an operation envelope as pretty JSON
pub fn print_json<T: Serialize>(result: &OperationResult<T>) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

/// Wallet as shown to users
#[derive(Debug, Serialize)]
pub struct WalletView {
    pub id: String,
    pub balance: String,
    /// Table output only
    #[serde(skip)]
    pub created_at: String,
}

impl From<&Account> for WalletView {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.to_string(),
            balance: account.balance.to_string(),
            created_at: format_time(&account.created_at),
        }
    }
}

/// Transfer as shown to users
#[derive(Debug, Serialize)]
pub struct TransferView {
    pub id: String,
    pub time: String,
    pub from: String,
    pub to: String,
    pub amount: String,
}

impl From<&Transfer> for TransferView {
    fn from(transfer: &Transfer) -> Self {
        Self {
            id: transfer.id.to_string(),
            time: format_time(&transfer.timestamp),
            from: transfer.from.to_string(),
            to: transfer.to.to_string(),
            amount: transfer.amount.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    use super::*;
    use ewallet_core::AccountId;

    #[test]
    fn test_transfer_view_uses_wire_time() {
        let ts = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 58).unwrap();
        let transfer = Transfer::at(AccountId::new(), AccountId::new(), Decimal::new(125, 1), ts);

        let view = TransferView::from(&transfer);

        assert_eq!(view.time, "2024-02-29 23:59:58");
        assert_eq!(view.amount, "12.5");
        assert_eq!(view.from, transfer.from.to_string());
    }
}

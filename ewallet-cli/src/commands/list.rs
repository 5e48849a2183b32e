//! List command - show all wallets

use anyhow::Result;
use colored::Colorize;
use rust_decimal::Decimal;

use super::{finish, get_context};
use crate::output::{self, WalletView};

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let accounts = ctx.query_service.list_accounts();
    let total: Decimal = match &accounts {
        Ok(accounts) => accounts.iter().map(|account| account.balance).sum(),
        Err(_) => Decimal::ZERO,
    };
    let result = accounts.map(|accounts| accounts.iter().map(WalletView::from).collect::<Vec<_>>());

    let Some(wallets) = finish(json, result)? else {
        return Ok(());
    };

    if wallets.is_empty() {
        output::info("No wallets yet. Create one with `ewallet new`.");
        return Ok(());
    }

    println!("{}", "Wallets".bold());
    let mut table = output::create_table();
    table.set_header(vec!["ID", "Balance", "Created"]);
    for wallet in &wallets {
        table.add_row(vec![&wallet.id, &wallet.balance, &wallet.created_at]);
    }
    println!("{}", table);
    println!("{} wallet(s), {} in total", wallets.len(), total);
    Ok(())
}

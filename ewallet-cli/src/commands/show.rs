//! Show command - display one wallet

use anyhow::Result;
use colored::Colorize;
use ewallet_core::{AccountId, AccountRole};

use super::{finish, get_context};
use crate::output::{self, WalletView};

pub fn run(id: &str, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let result = AccountId::parse_for(AccountRole::Account, id)
        .and_then(|id| ctx.query_service.get_account(&id))
        .map(|account| WalletView::from(&account));

    if let Some(wallet) = finish(json, result)? {
        println!("{}", "Wallet".bold());
        let mut table = output::create_table();
        table.add_row(vec!["ID", &wallet.id]);
        table.add_row(vec!["Balance", &wallet.balance]);
        table.add_row(vec!["Created", &wallet.created_at]);
        println!("{}", table);
    }
    Ok(())
}

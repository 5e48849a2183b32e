//! New command - create a wallet

use anyhow::Result;

use super::{finish, get_context};
use crate::output::{self, WalletView};

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let result = ctx.lifecycle.create_account().map(|account| WalletView::from(&account));

    if let Some(wallet) = finish(json, result)? {
        output::success(&format!("Created wallet {}", wallet.id));
        println!("Balance: {}", wallet.balance);
    }
    Ok(())
}

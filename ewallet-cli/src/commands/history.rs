//! History command - transfers in and out of a wallet

use std::io;

use anyhow::Result;
use colored::Colorize;
use comfy_table::{Cell, Color};
use ewallet_core::{AccountId, AccountRole};

use super::{finish, get_context};
use crate::output::{self, TransferView};

/// Output format for history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Table,
    Json,
    Csv,
}

pub fn run(id: &str, format: Format) -> Result<()> {
    let ctx = get_context()?;
    let result = AccountId::parse_for(AccountRole::Account, id)
        .and_then(|account_id| ctx.query_service.history_for(&account_id))
        .map(|transfers| transfers.iter().map(TransferView::from).collect::<Vec<_>>());

    let Some(transfers) = finish(format == Format::Json, result)? else {
        return Ok(());
    };

    if format == Format::Csv {
        return write_csv(io::stdout().lock(), &transfers);
    }

    // Canonical form, as stored in the ledger
    let account = AccountId::parse_for(AccountRole::Account, id)?.to_string();
    if transfers.is_empty() {
        output::info(&format!("No transfers for wallet {}", account));
        return Ok(());
    }

    println!("{}", format!("History of {}", account).bold());
    let mut table = output::create_table();
    table.set_header(vec!["Time", "Transfer", "From", "To", "Amount"]);
    for transfer in &transfers {
        let amount = if transfer.from == account {
            Cell::new(format!("-{}", transfer.amount)).fg(Color::Red)
        } else {
            Cell::new(format!("+{}", transfer.amount)).fg(Color::Green)
        };
        table.add_row(vec![
            Cell::new(&transfer.time),
            Cell::new(&transfer.id),
            Cell::new(&transfer.from),
            Cell::new(&transfer.to),
            amount,
        ]);
    }
    println!("{}", table);
    Ok(())
}

fn write_csv<W: io::Write>(writer: W, transfers: &[TransferView]) -> Result<()> {
    // Header written by hand so an empty history still yields one
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(["id", "time", "from", "to", "amount"])?;
    for transfer in transfers {
        csv_writer.serialize(transfer)?;
    }
    csv_writer.flush()?;
    Ok(())
}

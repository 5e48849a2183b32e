//! EWallet CLI - wallets and transfers in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{doctor, history, list, new, send, show};
use ewallet_core::ErrorKind;

/// Environment variable holding the log filter
const LOG_ENV: &str = "EWALLET_LOG";

/// EWallet - wallets and transfers in your terminal
#[derive(Parser)]
#[command(name = "ewallet", version, about, long_about = None)]
struct Cli {
    /// Log debug events to stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new wallet
    New {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send money from one wallet to another
    Send {
        /// Source wallet ID
        from: String,
        /// Destination wallet ID
        #[arg(long)]
        to: String,
        /// Amount to send (up to 4 decimal places)
        #[arg(long)]
        amount: String,
        /// Retries on conflicts with concurrent transfers
        #[arg(long, default_value_t = 3)]
        retries: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a wallet and its balance
    Show {
        /// Wallet ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show transfers in and out of a wallet
    History {
        /// Wallet ID
        id: String,
        /// Output as JSON
        #[arg(long, conflicts_with = "csv")]
        json: bool,
        /// Output as CSV
        #[arg(long)]
        csv: bool,
    },

    /// List all wallets
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run ledger health checks
    Doctor {
        /// Show details for each finding
        #[arg(long, short)]
        verbose: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("Error: {:#}", e));
            ExitCode::from(exit_status_for(&e))
        }
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::New { json } => new::run(json),
        Commands::Send { from, to, amount, retries, json } => {
            send::run(&from, &to, &amount, retries, json)
        }
        Commands::Show { id, json } => show::run(&id, json),
        Commands::History { id, json, csv } => {
            let format = if json {
                history::Format::Json
            } else if csv {
                history::Format::Csv
            } else {
                history::Format::Table
            };
            history::run(&id, format)
        }
        Commands::List { json } => list::run(json),
        Commands::Doctor { verbose, json } => doctor::run(verbose, json),
    }
}

/// Process exit code for a failed command
///
/// 2: rejected request, 3: unknown wallet, 4: storage failure or timeout,
/// 5: bad configuration, 6: unhealthy ledger, 1: anything else.
fn exit_status_for(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<doctor::Unhealthy>().is_some() {
        return 6;
    }
    match err.chain().find_map(|e| e.downcast_ref::<ewallet_core::Error>()) {
        Some(core_err) => exit_status(core_err.kind()),
        None => 1,
    }
}

fn exit_status(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::InvalidAmount | ErrorKind::InvalidRequest | ErrorKind::InsufficientFunds => 2,
        ErrorKind::NotFound => 3,
        ErrorKind::Storage | ErrorKind::Timeout | ErrorKind::PreconditionViolation => 4,
        ErrorKind::Config => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status_groups() {
        assert_eq!(exit_status(ErrorKind::InsufficientFunds), 2);
        assert_eq!(exit_status(ErrorKind::InvalidAmount), 2);
        assert_eq!(exit_status(ErrorKind::NotFound), 3);
        assert_eq!(exit_status(ErrorKind::Timeout), 4);
        assert_eq!(exit_status(ErrorKind::Config), 5);
    }

    #[test]
    fn test_exit_code_finds_core_error_under_context() {
        let err = anyhow::Error::new(ewallet_core::Error::account_not_found(
            ewallet_core::AccountRole::Account,
            "x",
        ))
        .context("while loading wallet");
        assert_eq!(exit_status_for(&err), 3);

        let err = anyhow::anyhow!("plain failure");
        assert_eq!(exit_status_for(&err), 1);
    }

    #[test]
    fn test_parse_send() {
        let cli = Cli::try_parse_from([
            "ewallet", "send", "a", "--to", "b", "--amount", "1.5", "--json",
        ])
        .unwrap();
        match cli.command {
            Commands::Send { from, to, amount, retries, json } => {
                assert_eq!(from, "a");
                assert_eq!(to, "b");
                assert_eq!(amount, "1.5");
                assert_eq!(retries, 3);
                assert!(json);
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn test_history_formats_conflict() {
        assert!(Cli::try_parse_from(["ewallet", "history", "a", "--json", "--csv"]).is_err());
    }
}

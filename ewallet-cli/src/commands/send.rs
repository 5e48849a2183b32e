//! Send command - transfer money between wallets

use std::time::Duration;

use anyhow::Result;
use ewallet_core::domain::parse_amount;
use ewallet_core::{AccountId, AccountRole, RetryPolicy};

use super::{finish, get_context};
use crate::output::{self, TransferView};

/// Delay before the first retry; doubles on each further attempt
const RETRY_DELAY: Duration = Duration::from_millis(20);

pub fn run(from: &str, to: &str, amount: &str, retries: u32, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let policy = RetryPolicy::new(retries.saturating_add(1), RETRY_DELAY);

    let result = parse_request(from, to, amount)
        .and_then(|(from, to, amount)| policy.run(|| ctx.engine.transfer(&from, &to, amount)))
        .map(|transfer| TransferView::from(&transfer));

    if let Some(transfer) = finish(json, result)? {
        output::success(&format!(
            "Sent {} from {} to {}",
            transfer.amount, transfer.from, transfer.to
        ));
        output::info(&format!("Transfer {} at {}", transfer.id, transfer.time));
    }
    Ok(())
}

fn parse_request(
    from: &str,
    to: &str,
    amount: &str,
) -> ewallet_core::domain::result::Result<(AccountId, AccountId, rust_decimal::Decimal)> {
    let amount = parse_amount(amount)?;
    let from = AccountId::parse_for(AccountRole::Source, from)?;
    let to = AccountId::parse_for(AccountRole::Destination, to)?;
    Ok((from, to, amount))
}

#[cfg(test)]
mod tests {
    use ewallet_core::ErrorKind;

    use super::*;

    #[test]
    fn test_parse_request_roles() {
        let id = AccountId::new().to_string();

        let err = parse_request("nope", &id, "1").unwrap_err();
        assert!(err.to_string().starts_with("source account not found"));

        let err = parse_request(&id, "nope", "1").unwrap_err();
        assert!(err.to_string().starts_with("destination account not found"));

        let err = parse_request(&id, &id, "1.23456").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
    }
}

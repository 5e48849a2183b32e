//! Transfer (ledger entry) domain model

use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AccountId, TransferId};

/// An immutable record of money moved from one account to another.
///
/// Timestamps are kept at microsecond precision, the resolution of the
/// ledger's `TIMESTAMP` column, so a recorded transfer reads back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    #[serde(rename = "time")]
    pub timestamp: DateTime<Utc>,
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Decimal,
}

impl Transfer {
    /// Create a transfer stamped with the current time
    pub fn new(from: AccountId, to: AccountId, amount: Decimal) -> Self {
        Self::at(from, to, amount, Utc::now())
    }

    /// Create a transfer stamped with an explicit time
    pub fn at(from: AccountId, to: AccountId, amount: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: TransferId::new(),
            timestamp: timestamp.trunc_subsecs(6),
            from,
            to,
            amount,
        }
    }

    /// Whether the account appears on either side of this transfer
    pub fn touches(&self, account: &AccountId) -> bool {
        self.from == *account || self.to == *account
    }

    /// Signed effect of this transfer on the given account's balance
    pub fn net_effect_on(&self, account: &AccountId) -> Decimal {
        let mut effect = Decimal::ZERO;
        if self.to == *account {
            effect += self.amount;
        }
        if self.from == *account {
            effect -= self.amount;
        }
        effect
    }
}

//! Account domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::AccountId;

/// Initial grant every new account receives unless configured otherwise
pub const DEFAULT_INITIAL_BALANCE: Decimal = Decimal::from_parts(100, 0, 0, false, 0);

/// A wallet holding a non-negative balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(id: AccountId, balance: Decimal, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            balance,
            created_at,
        }
    }

    /// Balance left after debiting `amount`, or `None` if it would go negative
    pub fn balance_after_debit(&self, amount: Decimal) -> Option<Decimal> {
        self.balance
            .checked_sub(amount)
            .filter(|remaining| !remaining.is_sign_negative() || remaining.is_zero())
    }

    /// Balance after crediting `amount`, or `None` on arithmetic overflow
    pub fn balance_after_credit(&self, amount: Decimal) -> Option<Decimal> {
        self.balance.checked_add(amount)
    }
}

//! Identifiers for accounts and transfers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::result::{Error, Result};

/// Opaque account identifier, allocated by the account store.
///
/// The derived `Ord` is the canonical account ordering: whenever two accounts
/// are touched by one unit of work they are read in ascending id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(Uuid);

impl AccountId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a caller-supplied id.
    ///
    /// A malformed id cannot name an existing account, so it is reported as
    /// `NotFound` for the role it was supplied in.
    pub fn parse_for(role: AccountRole, raw: &str) -> Result<Self> {
        raw.trim()
            .parse()
            .map_err(|_| Error::account_not_found(role, raw))
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for AccountId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque transfer identifier, allocated when the transfer is recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(Uuid);

impl TransferId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for TransferId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The position an account id was supplied in, used for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountRole {
    Account,
    Source,
    Destination,
}

impl fmt::Display for AccountRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AccountRole::Account => "account",
            AccountRole::Source => "source account",
            AccountRole::Destination => "destination account",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::result::ErrorKind;

    #[test]
    fn test_parse_for_roundtrips_display() {
        let id = AccountId::new();
        let parsed = AccountId::parse_for(AccountRole::Account, &id.to_string()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_parse_for_trims_whitespace() {
        let id = AccountId::new();
        let parsed = AccountId::parse_for(AccountRole::Source, &format!("  {} ", id)).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_malformed_id_is_not_found_for_role() {
        let err = AccountId::parse_for(AccountRole::Destination, "not-a-wallet").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().starts_with("destination account"));
    }

    #[test]
    fn test_canonical_order_matches_string_order() {
        let a: AccountId = "00000000-0000-4000-8000-000000000001".parse().unwrap();
        let b: AccountId = "ffffffff-0000-4000-8000-000000000001".parse().unwrap();
        assert!(a < b);
        assert!(a.to_string() < b.to_string());
    }
}

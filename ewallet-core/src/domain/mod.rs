//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
pub mod amount;
mod ids;
pub mod result;
mod transfer;

pub use account::{Account, DEFAULT_INITIAL_BALANCE};
pub use amount::{parse_amount, validate_amount, AMOUNT_SCALE, MAX_AMOUNT};
pub use ids::{AccountId, AccountRole, TransferId};
pub use transfer::Transfer;

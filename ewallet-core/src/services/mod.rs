//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod account;
mod doctor;
pub mod migration;
mod query;
mod retry;
mod transfer;

pub use account::AccountLifecycle;
pub use doctor::{CheckResult, DoctorResult, DoctorService, DoctorSummary};
pub use migration::{MigrationResult, MigrationService};
pub use query::QueryService;
pub use retry::RetryPolicy;
pub use transfer::TransferEngine;

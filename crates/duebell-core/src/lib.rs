//! Shared configuration, error and contract types for the Duebell workspace.

pub mod config;
pub mod error;
pub mod types;

pub use config::DuebellConfig;
pub use error::{DuebellError, Result};
pub use types::{BillingCycle, Contract};

//! Row types for each table, with conversions into the domain types.

pub mod account;
pub mod job;
pub mod ledger;

use goldrush_core::error::CoreError;

/// A row whose stored value no longer maps onto a domain enum.
pub(crate) fn corrupt(table: &str, column: &str, value: impl std::fmt::Display) -> CoreError {
    CoreError::Internal(format!("Invalid {table}.{column} value '{value}'"))
}

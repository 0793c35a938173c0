use std::{fmt::Display, str::FromStr};

use strum::IntoEnumIterator;

use crate::error::AppError;

pub mod attendance;
pub mod employee;
pub mod leave_request;
pub mod payroll;
pub mod project;
pub mod role;
pub mod user;

/// Comma separated wire spellings of every variant, e.g. `Pending, Approved, Paid, Rejected`.
pub fn enum_values<T: IntoEnumIterator + Display>() -> String {
    T::iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parses an enum column read back from the database.
pub(crate) fn parse_column<T: FromStr>(raw: &str, column: &str, id: u64) -> Result<T, AppError> {
    raw.parse::<T>().map_err(|_| {
        AppError::Internal(anyhow::anyhow!(
            "unexpected value '{raw}' in column {column} of row {id}"
        ))
    })
}

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite};
use thiserror::Error;

use leaveflow_core::ports::StoreError;

pub mod employee;
pub mod leave;
pub mod memory;

pub use employee::SqlEmployeeRepository;
pub use leave::SqlLeaveRepository;
pub use memory::{InMemoryEmployeeRepository, InMemoryLeaveRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    /// A guarded update matched no row.
    #[error("stale write: {0}")]
    Stale(String),
}

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Stale(message) => Self::Conflict(message),
            other => Self::Backend(other.to_string()),
        }
    }
}

pub(crate) fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name).map_err(|e| RepositoryError::Decode(format!("{name}: {e}")))
}

pub(crate) fn parse_timestamp(name: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{name} `{value}`: {e}")))
}

pub(crate) fn parse_date(name: &str, value: &str) -> Result<NaiveDate, RepositoryError> {
    value
        .parse::<NaiveDate>()
        .map_err(|e| RepositoryError::Decode(format!("{name} `{value}`: {e}")))
}

pub(crate) fn parse_decimal(name: &str, value: &str) -> Result<Decimal, RepositoryError> {
    value
        .parse::<Decimal>()
        .map_err(|e| RepositoryError::Decode(format!("{name} `{value}`: {e}")))
}

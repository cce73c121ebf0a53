use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use thosejobs_core::errors::StoreError;

pub mod job;
pub mod memory;
pub mod profile;
pub mod quotation;

pub use job::SqlJobRepository;
pub use memory::{InMemoryJobRepository, InMemoryProfileRepository, InMemoryQuotationRepository};
pub use profile::SqlProfileRepository;
pub use quotation::SqlQuotationRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(sqlx::Error::Database(database))
                if database.is_unique_violation() =>
            {
                StoreError::UniqueViolation(database.message().to_owned())
            }
            RepositoryError::Database(other) => StoreError::Transport(other.to_string()),
            RepositoryError::Decode(message) => StoreError::Decode(message),
        }
    }
}

/// Fixed-width RFC 3339 so lexical order in SQLite matches time order.
pub(crate) fn encode_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(
    column: &str,
    value: String,
) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_decimal(column: &str, value: String) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(&value).map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `{column}`: `{value}` ({error})"))
    })
}

pub(crate) fn parse_json_list(column: &str, value: String) -> Result<Vec<String>, RepositoryError> {
    serde_json::from_str(&value).map_err(|error| {
        RepositoryError::Decode(format!("invalid JSON array in `{column}`: `{value}` ({error})"))
    })
}

pub(crate) fn encode_json_list<'a>(values: impl Iterator<Item = &'a str>) -> String {
    let items = values.map(|value| serde_json::Value::String(value.to_owned())).collect();
    serde_json::Value::Array(items).to_string()
}

//! Error types for each stage of a conversion

use crate::core::currency::CurrencyCode;
use rust_decimal::Decimal;
use thiserror::Error;

/// The input could not be read as an amount and currencies.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("No amount found in '{0}'")]
    MissingAmount(String),

    #[error("No currency found in '{0}'")]
    MissingCurrency(String),

    #[error("'{0}' is not a valid currency code")]
    InvalidCurrency(String),

    #[error("'{0}' is not a valid amount")]
    InvalidAmount(String),
}

/// A cache backend failed to read or write.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Cache record could not be encoded or decoded: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Disk cache error: {0}")]
    Disk(#[from] fjall::Error),

    #[error("Remote cache error: {0}")]
    Remote(#[from] reqwest::Error),

    #[error("Remote cache returned HTTP {status} for key {key}")]
    RemoteStatus { status: u16, key: String },

    #[error("Cache flush did not complete: {0}")]
    Flush(String),

    #[error("Operation '{0}' is not supported by the {1} cache")]
    Unsupported(&'static str, &'static str),
}

/// The rate source could not produce a table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Rate service unavailable: {0}")]
    Unavailable(String),

    #[error("Rate service returned an unreadable response: {0}")]
    Format(String),

    #[error("Rate service has no data for {0}")]
    NotFound(CurrencyCode),
}

impl SourceError {
    /// Only network and server side failures are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Unavailable(_))
    }
}

/// A rate could not be obtained, fresh or stale.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Could not fetch {base} rates after {attempts} attempt(s): {source}")]
    Source {
        base: CurrencyCode,
        attempts: usize,
        #[source]
        source: SourceError,
    },

    #[error("Rate service returned no rate for {from} to {to}")]
    NoData { from: CurrencyCode, to: CurrencyCode },

    #[error("Timed out waiting for {0} rates")]
    Timeout(CurrencyCode),

    #[error("Rate fetch for {0} stopped before completing")]
    Aborted(CurrencyCode),
}

/// The amount cannot be converted under the configured policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("Negative amounts are not allowed: {0}")]
    Negative(Decimal),

    #[error("Amount {amount} times rate {rate} is out of range")]
    Overflow { amount: Decimal, rate: Decimal },
}

/// Broad categories used to tell the user what went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The user can fix it by changing the input.
    Input,
    /// The rate service could not be reached.
    Unreachable,
    /// The rate service answered but had nothing for the currency.
    NoData,
}

/// Any failure of the parse, fetch, convert pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Amount(#[from] AmountError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl ConvertError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::Parse(_) | ConvertError::Amount(_) => ErrorKind::Input,
            ConvertError::Fetch(FetchError::NoData { .. })
            | ConvertError::Fetch(FetchError::Source {
                source: SourceError::NotFound(_),
                ..
            }) => ErrorKind::NoData,
            ConvertError::Fetch(_) => ErrorKind::Unreachable,
        }
    }
}

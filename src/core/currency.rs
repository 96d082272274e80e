//! Currency codes, rate records and the rate source abstraction

use crate::core::error::{ParseError, SourceError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

/// A three letter currency code, always stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when `s` has the shape of a code, ignoring case.
    pub fn is_valid(s: &str) -> bool {
        s.len() == 3 && s.chars().all(|c| c.is_ascii_alphabetic())
    }
}

impl FromStr for CurrencyCode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if !Self::is_valid(trimmed) {
            return Err(ParseError::InvalidCurrency(trimmed.to_string()));
        }
        Ok(CurrencyCode(trimmed.to_ascii_uppercase()))
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

impl Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cache key for a currency pair, rendered as `FROM:TO`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey {
    pub from: CurrencyCode,
    pub to: CurrencyCode,
}

impl PairKey {
    pub fn new(from: &CurrencyCode, to: &CurrencyCode) -> Self {
        Self {
            from: from.clone(),
            to: to.clone(),
        }
    }
}

impl Display for PairKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.from, self.to)
    }
}

/// One cached exchange rate. A refresh writes a new entry, it never mutates an old one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateEntry {
    pub base: CurrencyCode,
    pub quote: CurrencyCode,
    pub rate: Decimal,
    pub fetched_at: DateTime<Utc>,
}

impl RateEntry {
    pub fn key(&self) -> PairKey {
        PairKey::new(&self.base, &self.quote)
    }
}

/// Rates from one base currency to every quote currency the source knows.
pub type RateTable = HashMap<CurrencyCode, Decimal>;

#[async_trait]
pub trait RateSource: Send + Sync {
    /// Fetches the full rate table for `base`.
    async fn fetch_table(&self, base: &CurrencyCode) -> Result<RateTable, SourceError>;
}

use crate::core::currency::{CurrencyCode, RateSource, RateTable};
use crate::core::error::SourceError;
use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Rate source for Frankfurter style APIs: `GET /latest?from=USD` returns the
/// rates from USD to every other currency the service publishes.
pub struct FrankfurterProvider {
    base_url: String,
    client: reqwest::Client,
}

impl FrankfurterProvider {
    pub fn new(base_url: &str) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .user_agent("curconv/0.1")
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SourceError::Unavailable(format!("Failed to build HTTP client: {e}")))?;
        Ok(FrankfurterProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    base: String,
    rates: HashMap<String, serde_json::Number>,
}

/// Reads a JSON number into a Decimal without a trip through f64.
fn parse_rate(number: &serde_json::Number) -> Option<Decimal> {
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn into_table(base: &CurrencyCode, response: LatestResponse) -> Result<RateTable, SourceError> {
    if !response.base.eq_ignore_ascii_case(base.as_str()) {
        return Err(SourceError::Format(format!(
            "asked for {} rates but got {}",
            base, response.base
        )));
    }

    let mut table = RateTable::with_capacity(response.rates.len());
    for (code, number) in &response.rates {
        let Ok(quote) = code.parse::<CurrencyCode>() else {
            debug!("Skipping unknown currency code {:?}", code);
            continue;
        };
        match parse_rate(number) {
            Some(rate) if rate > Decimal::ZERO => {
                table.insert(quote, rate);
            }
            _ => warn!("Skipping unusable rate {} for {}{}", number, base, quote),
        }
    }
    Ok(table)
}

#[async_trait]
impl RateSource for FrankfurterProvider {
    #[instrument(name = "FrankfurterFetch", skip(self), fields(base = %base))]
    async fn fetch_table(&self, base: &CurrencyCode) -> Result<RateTable, SourceError> {
        let url = format!("{}/latest?from={}", self.base_url, base);
        debug!("Requesting rates from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(format!("Request error: {e} for {base}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(SourceError::NotFound(base.clone()));
        }
        if !status.is_success() {
            return Err(SourceError::Unavailable(format!(
                "HTTP error: {status} for {base}"
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| SourceError::Unavailable(format!("Failed to read response: {e}")))?;

        let data: LatestResponse = serde_json::from_str(&text).map_err(|e| {
            SourceError::Format(format!("Failed to parse JSON response for {base}: {e}"))
        })?;

        let table = into_table(base, data)?;
        debug!("Received {} rates for {}", table.len(), base);
        Ok(table)
    }
}

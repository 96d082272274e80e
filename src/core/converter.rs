use crate::core::currency::CurrencyCode;
use crate::core::error::AmountError;
use rust_decimal::{Decimal, RoundingStrategy};

pub const DEFAULT_PRECISION: u32 = 2;

/// Conventional number of fractional digits for a currency (ISO 4217 minor units).
pub fn minor_units(code: &CurrencyCode) -> u32 {
    match code.as_str() {
        "BIF" | "CLP" | "DJF" | "GNF" | "ISK" | "JPY" | "KMF" | "KRW" | "PYG" | "RWF" | "UGX"
        | "UYI" | "VND" | "VUV" | "XAF" | "XOF" | "XPF" => 0,
        "BHD" | "IQD" | "JOD" | "KWD" | "LYD" | "OMR" | "TND" => 3,
        "CLF" | "UYW" => 4,
        _ => DEFAULT_PRECISION,
    }
}

/// Applies exchange rates to amounts using decimal arithmetic and banker's rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Converter {
    precision: Option<u32>,
    allow_negative: bool,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(None, false)
    }
}

impl Converter {
    /// `precision` fixes the number of fractional digits for every currency;
    /// `None` uses [`DEFAULT_PRECISION`] for [`Converter::apply`] and the quote
    /// currency's minor units for [`Converter::apply_for`].
    pub fn new(precision: Option<u32>, allow_negative: bool) -> Self {
        Self {
            precision,
            allow_negative,
        }
    }

    pub fn precision_for(&self, code: &CurrencyCode) -> u32 {
        self.precision.unwrap_or_else(|| minor_units(code))
    }

    pub fn apply(&self, amount: Decimal, rate: Decimal) -> Result<Decimal, AmountError> {
        self.apply_with(amount, rate, self.precision.unwrap_or(DEFAULT_PRECISION))
    }

    /// Like [`Converter::apply`], rounding to the conventions of `to`.
    pub fn apply_for(
        &self,
        amount: Decimal,
        rate: Decimal,
        to: &CurrencyCode,
    ) -> Result<Decimal, AmountError> {
        self.apply_with(amount, rate, self.precision_for(to))
    }

    fn apply_with(
        &self,
        amount: Decimal,
        rate: Decimal,
        precision: u32,
    ) -> Result<Decimal, AmountError> {
        if amount.is_sign_negative() && !amount.is_zero() && !self.allow_negative {
            return Err(AmountError::Negative(amount));
        }
        let product = amount
            .checked_mul(rate)
            .ok_or(AmountError::Overflow { amount, rate })?;
        Ok(product.round_dp_with_strategy(precision, RoundingStrategy::MidpointNearestEven))
    }
}

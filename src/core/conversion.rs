//! The parse, look up, convert pipeline shared by every CLI command.

use crate::core::converter::Converter;
use crate::core::error::ConvertError;
use crate::core::parser::{AmountParser, ConversionRequest};
use crate::core::rates::RateCache;
use rust_decimal::Decimal;
use tracing::debug;

/// A completed conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub request: ConversionRequest,
    pub rate: Decimal,
    pub result: Decimal,
    /// Fractional digits `result` was rounded to
    pub precision: u32,
}

impl Conversion {
    /// Renders as `10.00 USD = 9.20 EUR`.
    pub fn describe(&self) -> String {
        format!(
            "{:.prec$} {} = {:.prec$} {}",
            self.request.amount,
            self.request.from,
            self.result,
            self.request.to,
            prec = self.precision as usize
        )
    }

    /// Renders the unit rate, e.g. `1 USD = 0.92 EUR`.
    pub fn describe_rate(&self) -> String {
        format!(
            "1 {} = {} {}",
            self.request.from,
            self.rate.normalize(),
            self.request.to
        )
    }
}

pub struct ConversionService {
    parser: AmountParser,
    rates: RateCache,
    converter: Converter,
}

impl ConversionService {
    pub fn new(parser: AmountParser, rates: RateCache, converter: Converter) -> Self {
        Self {
            parser,
            rates,
            converter,
        }
    }

    pub fn rates(&self) -> &RateCache {
        &self.rates
    }

    pub fn parser(&self) -> &AmountParser {
        &self.parser
    }

    /// Parses `text` and converts it.
    pub async fn convert_text(&self, text: &str) -> Result<Conversion, ConvertError> {
        let request = self.parser.extract(text)?;
        self.convert(request).await
    }

    pub async fn convert(&self, request: ConversionRequest) -> Result<Conversion, ConvertError> {
        // Reject bad amounts before spending a network call on them
        self.converter.apply(request.amount, Decimal::ONE)?;

        let rate = self.rates.get_rate(&request.from, &request.to).await?;
        let result = self.converter.apply_for(request.amount, rate, &request.to)?;
        let precision = self.converter.precision_for(&request.to);
        debug!(
            "Converted {} {} to {} {} at {}",
            request.amount, request.from, result, request.to, rate
        );

        Ok(Conversion {
            request,
            rate,
            result,
            precision,
        })
    }
}

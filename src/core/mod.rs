//! Core business logic abstractions

pub mod cache;
pub mod clock;
pub mod config;
pub mod conversion;
pub mod converter;
pub mod currency;
pub mod error;
pub mod log;
pub mod parser;
pub mod rates;
pub mod retry;

// Re-export main types for cleaner imports
pub use cache::CacheStore;
pub use conversion::{Conversion, ConversionService};
pub use converter::Converter;
pub use currency::{CurrencyCode, PairKey, RateEntry, RateSource, RateTable};
pub use error::{ConvertError, ErrorKind, FetchError, ParseError, SourceError, StoreError};
pub use parser::{AmountParser, ConversionRequest};
pub use rates::{CachePolicy, RateCache};

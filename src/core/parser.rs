//! Reads amounts and currency codes out of free-form text such as `10 usd to eur`.

use crate::core::currency::CurrencyCode;
use crate::core::error::ParseError;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Words that may sit between the amount and the currencies.
const CONNECTOR_WORDS: &[&str] = &["to", "in", "into", "as", "for"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub amount: Decimal,
    pub from: CurrencyCode,
    pub to: CurrencyCode,
}

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Number(&'a str),
    Word(&'a str),
    Other(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Digit,
    Alpha,
    Symbol,
}

fn classify(c: char) -> CharClass {
    if c.is_ascii_digit() || matches!(c, '.' | ',' | '+' | '-') {
        CharClass::Digit
    } else if c.is_alphabetic() {
        CharClass::Alpha
    } else {
        CharClass::Symbol
    }
}

/// Splits a whitespace separated chunk where digits meet letters, so `10usd`
/// yields `10` and `usd`. Chunks mixing letters with symbols stay whole.
fn split_chunk(chunk: &str) -> Vec<Token<'_>> {
    if chunk.chars().any(|c| classify(c) == CharClass::Symbol) {
        return vec![Token::Other(chunk)];
    }

    let mut tokens = Vec::new();
    let mut start = 0;
    let mut current: Option<CharClass> = None;
    for (idx, c) in chunk.char_indices() {
        let class = classify(c);
        if let Some(prev) = current
            && prev != class
        {
            tokens.push(make_token(&chunk[start..idx], prev));
            start = idx;
        }
        current = Some(class);
    }
    if let Some(class) = current {
        tokens.push(make_token(&chunk[start..], class));
    }
    tokens
}

fn is_currency_symbol(c: char) -> bool {
    matches!(
        c,
        '$' | '€' | '£' | '¥' | '¢' | '₹' | '₩' | '₽' | '₺' | '₪' | '₫' | '฿' | '₿'
    )
}

/// A code with a currency sign in it, like `U$D` or `€UR`.
fn looks_like_code(raw: &str) -> bool {
    raw.chars().count() == 3
        && raw.chars().any(char::is_alphabetic)
        && raw.chars().any(is_currency_symbol)
        && raw.chars().all(|c| c.is_alphabetic() || is_currency_symbol(c))
}

fn make_token(text: &str, class: CharClass) -> Token<'_> {
    match class {
        CharClass::Digit if text.chars().any(|c| c.is_ascii_digit()) => Token::Number(text),
        CharClass::Alpha => Token::Word(text),
        _ => Token::Other(text),
    }
}

fn parse_amount(text: &str) -> Result<Decimal, ParseError> {
    let cleaned: String = text.chars().filter(|c| *c != ',').collect();
    let unsigned = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    Decimal::from_str(unsigned).map_err(|_| ParseError::InvalidAmount(text.to_string()))
}

/// Extracts conversion requests from user input.
#[derive(Debug, Clone)]
pub struct AmountParser {
    default_to: CurrencyCode,
}

impl AmountParser {
    /// `default_to` is used when the input names a single currency.
    pub fn new(default_to: CurrencyCode) -> Self {
        Self { default_to }
    }

    pub fn default_currency(&self) -> &CurrencyCode {
        &self.default_to
    }

    pub fn extract(&self, text: &str) -> Result<ConversionRequest, ParseError> {
        let mut amount: Option<Decimal> = None;
        let mut currencies: Vec<CurrencyCode> = Vec::with_capacity(2);

        let tokens = text.split_whitespace().flat_map(split_chunk);
        for token in tokens {
            if amount.is_some() && currencies.len() == 2 {
                break;
            }
            match token {
                Token::Number(raw) => {
                    if amount.is_none() {
                        amount = Some(parse_amount(raw)?);
                    }
                }
                Token::Word(word) => {
                    let lower = word.to_lowercase();
                    if CONNECTOR_WORDS.contains(&lower.as_str()) || currencies.len() == 2 {
                        continue;
                    }
                    if word.chars().count() == 3 {
                        currencies.push(word.parse()?);
                    }
                }
                Token::Other(raw) => {
                    if looks_like_code(raw) && currencies.len() < 2 {
                        return Err(ParseError::InvalidCurrency(raw.to_string()));
                    }
                }
            }
        }

        let amount = amount.ok_or_else(|| ParseError::MissingAmount(text.trim().to_string()))?;
        let mut currencies = currencies.into_iter();
        let from = currencies
            .next()
            .ok_or_else(|| ParseError::MissingCurrency(text.trim().to_string()))?;
        let to = currencies.next().unwrap_or_else(|| self.default_to.clone());

        Ok(ConversionRequest { amount, from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> AmountParser {
        AmountParser::new("USD".parse().unwrap())
    }

    fn code(s: &str) -> CurrencyCode {
        s.parse().unwrap()
    }

    #[test]
    fn test_amount_from_and_to() {
        let req = parser().extract("10 USD to EUR").unwrap();
        assert_eq!(
            req,
            ConversionRequest {
                amount: Decimal::from(10),
                from: code("USD"),
                to: code("EUR"),
            }
        );
    }

    #[test]
    fn test_single_currency_uses_default() {
        let parser = AmountParser::new(code("AUD"));
        let req = parser.extract("5.25 gbp").unwrap();
        assert_eq!(req.amount, Decimal::new(525, 2));
        assert_eq!(req.from, code("GBP"));
        assert_eq!(req.to, code("AUD"));
    }

    #[test]
    fn test_no_amount() {
        assert_eq!(
            parser().extract("abc"),
            Err(ParseError::MissingAmount("abc".to_string()))
        );
    }

    #[test]
    fn test_no_currency() {
        assert_eq!(
            parser().extract("  42  "),
            Err(ParseError::MissingCurrency("42".to_string()))
        );
    }

    #[test]
    fn test_connectors_and_case_are_ignored() {
        for input in [
            "10 usd eur",
            "10 Usd in eUR",
            "10 USD into EUR",
            "10 USD as EUR",
            "10 USD for EUR",
            "usd 10 to eur",
        ] {
            let req = parser().extract(input).unwrap();
            assert_eq!(req.amount, Decimal::from(10), "{input}");
            assert_eq!(req.from, code("USD"), "{input}");
            assert_eq!(req.to, code("EUR"), "{input}");
        }
    }

    #[test]
    fn test_glued_amount_and_code() {
        let req = parser().extract("10usd to eur").unwrap();
        assert_eq!(req.amount, Decimal::from(10));
        assert_eq!(req.from, code("USD"));

        let req = parser().extract("gbp2.5 jpy").unwrap();
        assert_eq!(req.amount, Decimal::new(25, 1));
        assert_eq!(req.from, code("GBP"));
        assert_eq!(req.to, code("JPY"));
    }

    #[test]
    fn test_signs_and_separators() {
        assert_eq!(
            parser().extract("-3 eur").unwrap().amount,
            Decimal::from(-3)
        );
        assert_eq!(parser().extract("+3 eur").unwrap().amount, Decimal::from(3));
        assert_eq!(
            parser().extract("1,250.50 eur").unwrap().amount,
            Decimal::new(125050, 2)
        );
    }

    #[test]
    fn test_trailing_text_is_ignored() {
        let req = parser()
            .extract("10 usd to eur please, quickly!!")
            .unwrap();
        assert_eq!(req.from, code("USD"));
        assert_eq!(req.to, code("EUR"));
    }

    #[test]
    fn test_longer_words_are_skipped() {
        let req = parser().extract("convert 10 dollars usd to eur").unwrap();
        assert_eq!(req.from, code("USD"));
        assert_eq!(req.to, code("EUR"));
    }

    #[test]
    fn test_invalid_code_in_currency_slot() {
        assert_eq!(
            parser().extract("10 U$D to EUR"),
            Err(ParseError::InvalidCurrency("U$D".to_string()))
        );
        assert_eq!(
            parser().extract("5 €UR"),
            Err(ParseError::InvalidCurrency("€UR".to_string()))
        );
    }

    #[test]
    fn test_punctuated_words_are_not_codes() {
        let req = parser().extract("I'm converting 10 usd to eur").unwrap();
        assert_eq!(req.amount, Decimal::from(10));
        assert_eq!(req.from, code("USD"));
        assert_eq!(req.to, code("EUR"));
    }

    #[test]
    fn test_invalid_amount() {
        assert_eq!(
            parser().extract("1.2.3 usd"),
            Err(ParseError::InvalidAmount("1.2.3".to_string()))
        );
    }
}

//! Third-party market quote models (Alpha Vantage).

use rust_decimal::Decimal;
use serde::Deserialize;

/// One candidate of a symbol search.
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolMatch {
    /// Ticker symbol
    #[serde(rename = "1. symbol")]
    pub symbol: String,
    /// Security name
    #[serde(rename = "2. name", default)]
    pub name: String,
}

/// Symbol search result, best match first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SymbolSearch {
    /// Candidates ordered by relevance
    #[serde(rename = "bestMatches", default)]
    pub best_matches: Vec<SymbolMatch>,
    /// Rate-limit or usage notice sent instead of data
    #[serde(rename = "Note", alias = "Information", default)]
    pub note: Option<String>,
}

/// Latest quote of one symbol.
///
/// Unknown symbols come back as an empty object, hence every field is
/// optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalQuote {
    /// Ticker symbol
    #[serde(rename = "01. symbol", default)]
    pub symbol: Option<String>,
    /// Last price
    #[serde(rename = "05. price", default, with = "rust_decimal::serde::str_option")]
    pub price: Option<Decimal>,
}

/// Envelope of a quote request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalQuoteResponse {
    /// The quote, absent on errors
    #[serde(rename = "Global Quote", default)]
    pub quote: Option<GlobalQuote>,
    /// Rate-limit or usage notice sent instead of data
    #[serde(rename = "Note", alias = "Information", default)]
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quote_decoding() {
        let json = r#"{"Global Quote": {"01. symbol": "IBM", "05. price": "123.4500", "07. latest trading day": "2024-05-03"}}"#;
        let parsed: GlobalQuoteResponse = serde_json::from_str(json).unwrap();
        let quote = parsed.quote.unwrap();
        assert_eq!(quote.symbol.as_deref(), Some("IBM"));
        assert_eq!(quote.price, Some(dec!(123.4500)));
    }

    #[test]
    fn test_unknown_symbol_quote_is_empty() {
        let parsed: GlobalQuoteResponse = serde_json::from_str(r#"{"Global Quote": {}}"#).unwrap();
        assert!(parsed.quote.unwrap().price.is_none());
    }

    #[test]
    fn test_rate_limit_notice() {
        let parsed: SymbolSearch =
            serde_json::from_str(r#"{"Information": "rate limit reached"}"#).unwrap();
        assert!(parsed.best_matches.is_empty());
        assert_eq!(parsed.note.as_deref(), Some("rate limit reached"));
    }
}

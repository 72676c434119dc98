//! Instruments and watchlist parsing.
//!
//! An [`Instrument`] is fixed once built: fields are private and only exposed
//! through getters.

use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instrument {
    symbol: String,
    exchange: String,
    provider_id: String,
}

impl Instrument {
    /// Symbol and exchange are trimmed and uppercased. An empty provider id
    /// falls back to `EXCHANGE:SYMBOL`.
    pub fn new(symbol: &str, exchange: &str, provider_id: &str) -> Self {
        let symbol = symbol.trim().to_uppercase();
        let exchange = exchange.trim().to_uppercase();
        let provider_id = match provider_id.trim() {
            "" => format!("{}:{}", exchange, symbol),
            id => id.to_string(),
        };
        Self {
            symbol,
            exchange,
            provider_id,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exchange, self.symbol)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum WatchlistError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, WatchlistError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(WatchlistError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(WatchlistError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

/// Drops blank entries and repeated (symbol, exchange) pairs, keeping first
/// occurrence order.
pub fn dedupe_watchlist(instruments: Vec<Instrument>) -> Vec<Instrument> {
    let mut seen = HashSet::new();
    instruments
        .into_iter()
        .filter(|i| !i.symbol().is_empty())
        .filter(|i| seen.insert((i.symbol().to_string(), i.exchange().to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalizes_symbol_and_exchange() {
        let inst = Instrument::new(" reliance ", "nse", "738561");
        assert_eq!(inst.symbol(), "RELIANCE");
        assert_eq!(inst.exchange(), "NSE");
        assert_eq!(inst.provider_id(), "738561");
    }

    #[test]
    fn provider_id_defaults_to_exchange_symbol() {
        let inst = Instrument::new("infy", "NSE", "  ");
        assert_eq!(inst.provider_id(), "NSE:INFY");
        assert_eq!(inst.to_string(), "NSE:INFY");
    }

    #[test]
    fn parse_symbols_basic() {
        let result = parse_symbols(" tcs , INFY,hdfcbank").unwrap();
        assert_eq!(result, vec!["TCS", "INFY", "HDFCBANK"]);
    }

    #[test]
    fn parse_symbols_empty_token() {
        assert!(matches!(
            parse_symbols("TCS,,INFY"),
            Err(WatchlistError::EmptyToken)
        ));
    }

    #[test]
    fn parse_symbols_duplicate() {
        let result = parse_symbols("TCS,INFY,tcs");
        assert!(matches!(result, Err(WatchlistError::DuplicateSymbol(s)) if s == "TCS"));
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let list = vec![
            Instrument::new("TCS", "NSE", ""),
            Instrument::new("", "NSE", ""),
            Instrument::new("INFY", "NSE", ""),
            Instrument::new("tcs", "NSE", "other"),
            Instrument::new("TCS", "BSE", ""),
        ];
        let out = dedupe_watchlist(list);
        let keys: Vec<String> = out.iter().map(|i| i.to_string()).collect();
        assert_eq!(keys, vec!["NSE:TCS", "NSE:INFY", "BSE:TCS"]);
        assert_eq!(out[0].provider_id(), "NSE:TCS");
    }
}

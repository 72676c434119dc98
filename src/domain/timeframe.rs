//! Bar timeframes.
//!
//! Each timeframe has a short label used in config sections and export
//! headers (`15m`, `1d`) and a provider interval name (`15minute`, `day`).
//! Ordering follows bar duration, which gives every multi-timeframe
//! computation a canonical iteration order.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Timeframe {
    Minute1,
    Minute3,
    Minute5,
    Minute10,
    Minute15,
    Minute30,
    Minute60,
    Day,
}

impl Timeframe {
    pub const ALL: [Timeframe; 8] = [
        Timeframe::Minute1,
        Timeframe::Minute3,
        Timeframe::Minute5,
        Timeframe::Minute10,
        Timeframe::Minute15,
        Timeframe::Minute30,
        Timeframe::Minute60,
        Timeframe::Day,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Timeframe::Minute1 => "1m",
            Timeframe::Minute3 => "3m",
            Timeframe::Minute5 => "5m",
            Timeframe::Minute10 => "10m",
            Timeframe::Minute15 => "15m",
            Timeframe::Minute30 => "30m",
            Timeframe::Minute60 => "60m",
            Timeframe::Day => "1d",
        }
    }

    pub fn provider_interval(self) -> &'static str {
        match self {
            Timeframe::Minute1 => "minute",
            Timeframe::Minute3 => "3minute",
            Timeframe::Minute5 => "5minute",
            Timeframe::Minute10 => "10minute",
            Timeframe::Minute15 => "15minute",
            Timeframe::Minute30 => "30minute",
            Timeframe::Minute60 => "60minute",
            Timeframe::Day => "day",
        }
    }

    pub fn minutes(self) -> i64 {
        match self {
            Timeframe::Minute1 => 1,
            Timeframe::Minute3 => 3,
            Timeframe::Minute5 => 5,
            Timeframe::Minute10 => 10,
            Timeframe::Minute15 => 15,
            Timeframe::Minute30 => 30,
            Timeframe::Minute60 => 60,
            Timeframe::Day => 24 * 60,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown timeframe: {0}")]
pub struct UnknownTimeframe(pub String);

impl FromStr for Timeframe {
    type Err = UnknownTimeframe;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        let alias = match needle.as_str() {
            "1h" | "hour" => Some(Timeframe::Minute60),
            "day" | "d" | "daily" => Some(Timeframe::Day),
            _ => None,
        };
        alias
            .or_else(|| {
                Timeframe::ALL
                    .into_iter()
                    .find(|tf| tf.label() == needle || tf.provider_interval() == needle)
            })
            .ok_or_else(|| UnknownTimeframe(s.trim().to_string()))
    }
}

/// Parse a comma-separated timeframe list, rejecting empties and duplicates.
pub fn parse_timeframes(input: &str) -> Result<Vec<Timeframe>, UnknownTimeframe> {
    let mut out: Vec<Timeframe> = Vec::new();
    for token in input.split(',') {
        let tf: Timeframe = token.parse()?;
        if out.contains(&tf) {
            return Err(UnknownTimeframe(format!("duplicate {}", tf)));
        }
        out.push(tf);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labels_and_provider_names() {
        assert_eq!("15m".parse::<Timeframe>().unwrap(), Timeframe::Minute15);
        assert_eq!("15minute".parse::<Timeframe>().unwrap(), Timeframe::Minute15);
        assert_eq!("1D".parse::<Timeframe>().unwrap(), Timeframe::Day);
        assert_eq!("day".parse::<Timeframe>().unwrap(), Timeframe::Day);
        assert_eq!("1h".parse::<Timeframe>().unwrap(), Timeframe::Minute60);
        assert_eq!("minute".parse::<Timeframe>().unwrap(), Timeframe::Minute1);
    }

    #[test]
    fn rejects_unknown() {
        assert!("2h".parse::<Timeframe>().is_err());
        assert!("".parse::<Timeframe>().is_err());
    }

    #[test]
    fn ordering_follows_duration() {
        let mut sorted = Timeframe::ALL.to_vec();
        sorted.sort_by_key(|tf| tf.minutes());
        assert_eq!(sorted, Timeframe::ALL.to_vec());
        assert!(Timeframe::Minute15 < Timeframe::Day);
    }

    #[test]
    fn display_is_label() {
        assert_eq!(Timeframe::Minute15.to_string(), "15m");
        assert_eq!(Timeframe::Day.to_string(), "1d");
    }

    #[test]
    fn parse_list() {
        let tfs = parse_timeframes("15m, 1d").unwrap();
        assert_eq!(tfs, vec![Timeframe::Minute15, Timeframe::Day]);
    }

    #[test]
    fn parse_list_rejects_duplicate_and_empty() {
        assert!(parse_timeframes("15m,15minute").is_err());
        assert!(parse_timeframes("15m,,1d").is_err());
    }
}

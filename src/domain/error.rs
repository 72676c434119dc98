//! Domain error types.

use chrono::NaiveDateTime;

/// Top-level error type for tmvrank.
#[derive(Debug, thiserror::Error)]
pub enum TmvError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(
        "insufficient history for {symbol} [{timeframe}]: {indicator} needs {minimum} bars, have {bars}"
    )]
    InsufficientHistory {
        symbol: String,
        timeframe: String,
        indicator: String,
        bars: usize,
        minimum: usize,
    },

    #[error(
        "stale data for {symbol} [{timeframe}]: last bar {last_bar} is older than {max_age_minutes} minutes at {now}"
    )]
    StaleData {
        symbol: String,
        timeframe: String,
        last_bar: NaiveDateTime,
        now: NaiveDateTime,
        max_age_minutes: i64,
    },

    #[error("invalid bar for {symbol} [{timeframe}] at {timestamp}: {reason}")]
    InvalidBar {
        symbol: String,
        timeframe: String,
        timestamp: NaiveDateTime,
        reason: String,
    },

    #[error("{source_name} unavailable: {reason}")]
    UpstreamUnavailable { source_name: String, reason: String },

    #[error("watchlist is empty")]
    EmptyWatchlist,

    #[error("a refresh cycle is already in progress")]
    CycleInProgress,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TmvError {
    pub fn upstream(source_name: &str, reason: impl ToString) -> Self {
        TmvError::UpstreamUnavailable {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid(section: &str, key: &str, reason: impl ToString) -> Self {
        TmvError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn missing(section: &str, key: &str) -> Self {
        TmvError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }
}

impl From<&TmvError> for std::process::ExitCode {
    fn from(err: &TmvError) -> Self {
        let code: u8 = match err {
            TmvError::Io(_) => 1,
            TmvError::ConfigParse { .. }
            | TmvError::ConfigMissing { .. }
            | TmvError::ConfigInvalid { .. } => 2,
            TmvError::UpstreamUnavailable { .. } => 3,
            TmvError::InsufficientHistory { .. }
            | TmvError::StaleData { .. }
            | TmvError::InvalidBar { .. }
            | TmvError::EmptyWatchlist => 5,
            TmvError::CycleInProgress => 6,
        };
        std::process::ExitCode::from(code)
    }
}

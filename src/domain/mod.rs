//! Core domain types and logic.

pub mod ohlcv;
pub mod instrument;
pub mod timeframe;
pub mod indicator;
pub mod engine;
pub mod scorer;
pub mod aggregator;
pub mod snapshot;
pub mod freshness;
pub mod refresh;
pub mod config_validation;
pub mod error;

//! Core domain types and logic.

pub mod ohlcv;
pub mod price_series;
pub mod indicator;
pub mod trigger;
pub mod position;
pub mod simulator;
pub mod metrics;
pub mod fitness;
pub mod params;
pub mod crossover;
pub mod expr;
pub mod optimizer;
pub mod config_validation;
pub mod error;

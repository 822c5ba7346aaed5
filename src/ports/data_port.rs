//! Market data access port trait.

use crate::domain::error::EvotraderError;
use crate::domain::price_series::PriceSeries;
use chrono::{DateTime, Utc};

pub trait DataPort {
    /// Full bar history of one symbol, oldest first.
    fn fetch_ohlcv(&self, symbol: &str) -> Result<PriceSeries, EvotraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, EvotraderError>;

    /// First timestamp, last timestamp and bar count; `None` when the symbol has no bars.
    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, EvotraderError> {
        let series = self.fetch_ohlcv(symbol)?;
        let bars = series.bars();
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp, bars.len())),
            _ => None,
        })
    }
}

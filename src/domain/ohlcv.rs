//! OHLCV bar representation.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    /// Build a bar from the exchange 6-tuple `(timestamp_ms, open, high, low, close, volume)`.
    ///
    /// Returns `None` when the millisecond timestamp is outside chrono's range.
    pub fn from_tuple(row: (i64, f64, f64, f64, f64, f64)) -> Option<Self> {
        let (ms, open, high, low, close, volume) = row;
        let timestamp = DateTime::<Utc>::from_timestamp_millis(ms)?;
        Some(Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

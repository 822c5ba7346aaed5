//! Indexable price series with aligned indicator columns.

use crate::domain::error::EvotraderError;
use crate::domain::ohlcv::OhlcvBar;
use std::collections::BTreeMap;

pub const MACD_DIFF: &str = "macd_diff";
pub const RSI: &str = "rsi";

pub fn sma_column(window: usize) -> String {
    format!("sma_{}", window)
}

pub fn ema_column(window: usize) -> String {
    format!("ema_{}", window)
}

/// Ordered bars plus named derived columns of the same length.
///
/// A column entry is `None` while its indicator is still warming up.
#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    bars: Vec<OhlcvBar>,
    columns: BTreeMap<String, Vec<Option<f64>>>,
}

impl PriceSeries {
    /// Fails unless timestamps are strictly increasing.
    pub fn new(bars: Vec<OhlcvBar>) -> Result<Self, EvotraderError> {
        if let Some(pos) = bars.windows(2).position(|w| w[1].timestamp <= w[0].timestamp) {
            return Err(EvotraderError::Data {
                reason: format!(
                    "timestamps must be strictly increasing (bar {} at {} follows {})",
                    pos + 1,
                    bars[pos + 1].timestamp,
                    bars[pos].timestamp
                ),
            });
        }
        Ok(Self {
            bars,
            columns: BTreeMap::new(),
        })
    }

    /// Convenience constructor from exchange tuples.
    pub fn from_tuples(rows: &[(i64, f64, f64, f64, f64, f64)]) -> Result<Self, EvotraderError> {
        let bars = rows
            .iter()
            .map(|&row| {
                OhlcvBar::from_tuple(row).ok_or_else(|| EvotraderError::Data {
                    reason: format!("timestamp {} out of range", row.0),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(bars)
    }

    /// Attach (or replace) a derived column.
    pub fn with_column(
        mut self,
        name: &str,
        values: Vec<Option<f64>>,
    ) -> Result<Self, EvotraderError> {
        if values.len() != self.bars.len() {
            return Err(EvotraderError::Data {
                reason: format!(
                    "column {} has {} values, series has {} bars",
                    name,
                    values.len(),
                    self.bars.len()
                ),
            });
        }
        self.columns.insert(name.to_string(), values);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn bar(&self, t: usize) -> Option<&OhlcvBar> {
        self.bars.get(t)
    }

    pub fn close(&self, t: usize) -> Option<f64> {
        self.bars.get(t).map(|b| b.close)
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Value of `name` at `t`; `None` if the column is missing, `t` is out of range,
    /// or the value is still in warm-up.
    pub fn value(&self, name: &str, t: usize) -> Option<f64> {
        self.columns.get(name)?.get(t).copied().flatten()
    }

    /// First index at which `name` is defined.
    pub fn first_defined(&self, name: &str) -> Option<usize> {
        self.columns.get(name)?.iter().position(Option::is_some)
    }
}

//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters
//! - `IndicatorSeries`: A time series of indicator values
//!
//! Every indicator is causal: the value at index `t` only depends on bars `0..=t`,
//! and warm-up points carry `valid == false`.

pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use ema::calculate_ema;
pub use macd::calculate_macd;
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;

use crate::domain::error::EvotraderError;
use crate::domain::price_series::{self, PriceSeries};
use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub timestamp: DateTime<Utc>,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Flatten to a column aligned with the source bars: `None` for warm-up points.
    ///
    /// MACD series yield their histogram (`line - signal`).
    pub fn to_column(&self) -> Vec<Option<f64>> {
        self.values
            .iter()
            .map(|p| {
                if !p.valid {
                    return None;
                }
                match p.value {
                    IndicatorValue::Simple(v) => Some(v),
                    IndicatorValue::Macd { histogram, .. } => Some(histogram),
                }
            })
            .collect()
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
        }
    }
}

/// Window sizes handed to [`compute_indicators`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorWindows {
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub rsi: usize,
    /// Extra simple moving averages, stored as `sma_<window>` columns.
    pub sma: Vec<usize>,
    /// Extra exponential moving averages, stored as `ema_<window>` columns.
    pub ema: Vec<usize>,
}

impl Default for IndicatorWindows {
    fn default() -> Self {
        Self {
            macd_fast: macd::DEFAULT_FAST,
            macd_slow: macd::DEFAULT_SLOW,
            macd_signal: macd::DEFAULT_SIGNAL,
            rsi: rsi::DEFAULT_PERIOD,
            sma: Vec::new(),
            ema: Vec::new(),
        }
    }
}

impl IndicatorWindows {
    pub fn validate(&self) -> Result<(), EvotraderError> {
        if self.macd_fast == 0 || self.macd_slow == 0 || self.macd_signal == 0 {
            return Err(EvotraderError::invalid(
                "indicators",
                "macd",
                "MACD windows must be positive",
            ));
        }
        if self.macd_fast > self.macd_slow {
            return Err(EvotraderError::invalid(
                "indicators",
                "macd_fast",
                format!(
                    "fast window {} exceeds slow window {}",
                    self.macd_fast, self.macd_slow
                ),
            ));
        }
        if self.rsi == 0 {
            return Err(EvotraderError::invalid(
                "indicators",
                "rsi",
                "RSI window must be positive",
            ));
        }
        if self.sma.contains(&0) {
            return Err(EvotraderError::invalid(
                "indicators",
                "sma",
                "SMA windows must be positive",
            ));
        }
        if self.ema.contains(&0) {
            return Err(EvotraderError::invalid(
                "indicators",
                "ema",
                "EMA windows must be positive",
            ));
        }
        Ok(())
    }
}

/// Annotate a series with `macd_diff`, `rsi` and any requested `sma_<n>` / `ema_<n>` columns.
///
/// Existing columns with the same names are replaced; the input is not modified.
pub fn compute_indicators(
    series: &PriceSeries,
    windows: &IndicatorWindows,
) -> Result<PriceSeries, EvotraderError> {
    windows.validate()?;
    let bars = series.bars();

    let macd = calculate_macd(bars, windows.macd_fast, windows.macd_slow, windows.macd_signal);
    let rsi = calculate_rsi(bars, windows.rsi);

    let mut annotated = series
        .clone()
        .with_column(price_series::MACD_DIFF, macd.to_column())?
        .with_column(price_series::RSI, rsi.to_column())?;

    for &window in &windows.sma {
        let sma = calculate_sma(bars, window);
        annotated = annotated.with_column(&price_series::sma_column(window), sma.to_column())?;
    }
    for &window in &windows.ema {
        let ema = calculate_ema(bars, window);
        annotated = annotated.with_column(&price_series::ema_column(window), ema.to_column())?;
    }

    Ok(annotated)
}


#[cfg(test)]
mod tests {
    use super::test_support::make_bars;
    use super::*;

    #[test]
    fn indicator_type_display_sma() {
        assert_eq!(IndicatorType::Sma(20).to_string(), "SMA(20)");
    }

    #[test]
    fn indicator_type_display_macd() {
        let macd = IndicatorType::Macd {
            fast: 12,
            slow: 26,
            signal: 9,
        };
        assert_eq!(macd.to_string(), "MACD(12,26,9)");
    }

    #[test]
    fn to_column_marks_warmup_as_none() {
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0]);
        let column = calculate_sma(&bars, 3).to_column();
        assert_eq!(column.len(), 4);
        assert!(column[0].is_none());
        assert!(column[1].is_none());
        assert_eq!(column[2], Some(2.0));
        assert_eq!(column[3], Some(3.0));
    }

    #[test]
    fn compute_indicators_adds_named_columns() {
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.4).sin() * 5.0).collect();
        let series = PriceSeries::new(make_bars(&prices)).unwrap();
        let windows = IndicatorWindows {
            sma: vec![5],
            ema: vec![4],
            ..IndicatorWindows::default()
        };

        let annotated = compute_indicators(&series, &windows).unwrap();

        let macd = annotated.column(price_series::MACD_DIFF).unwrap();
        let rsi = annotated.column(price_series::RSI).unwrap();
        let sma = annotated.column("sma_5").unwrap();
        let ema = annotated.column("ema_4").unwrap();
        assert_eq!(macd.len(), 60);
        assert_eq!(rsi.len(), 60);
        assert_eq!(sma.len(), 60);
        assert_eq!(ema.len(), 60);
        assert!(ema[2].is_none());
        assert!(ema[3].is_some());

        let macd_warmup = windows.macd_slow - 1 + windows.macd_signal - 1;
        assert!(macd[macd_warmup - 1].is_none());
        assert!(macd[macd_warmup].is_some());
        assert!(rsi[windows.rsi - 1].is_none());
        assert!(rsi[windows.rsi].is_some());
    }

    #[test]
    fn compute_indicators_rejects_inverted_macd_windows() {
        let series = PriceSeries::new(make_bars(&[1.0, 2.0])).unwrap();
        let windows = IndicatorWindows {
            macd_fast: 50,
            macd_slow: 20,
            ..IndicatorWindows::default()
        };
        let err = compute_indicators(&series, &windows).unwrap_err();
        assert!(matches!(err, EvotraderError::ConfigInvalid { .. }));
    }

    #[test]
    fn compute_indicators_short_series_is_all_warmup() {
        let series = PriceSeries::new(make_bars(&[1.0, 2.0, 3.0])).unwrap();
        let annotated = compute_indicators(&series, &IndicatorWindows::default()).unwrap();
        assert!(
            annotated
                .column(price_series::MACD_DIFF)
                .unwrap()
                .iter()
                .all(Option::is_none)
        );
        assert!(
            annotated
                .column(price_series::RSI)
                .unwrap()
                .iter()
                .all(Option::is_none)
        );
    }
}

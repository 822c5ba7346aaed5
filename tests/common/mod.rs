#![allow(dead_code)]

use evotrader::domain::error::EvotraderError;
use evotrader::domain::ohlcv::OhlcvBar;
pub use evotrader::domain::price_series::PriceSeries;
use evotrader::ports::data_port::DataPort;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

/// 2024-01-01T00:00:00Z
pub const START_MS: i64 = 1_704_067_200_000;
pub const HOUR_MS: i64 = 3_600_000;

pub struct MockDataPort {
    pub data: HashMap<String, PriceSeries>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_series(mut self, symbol: &str, series: PriceSeries) -> Self {
        self.data.insert(symbol.to_string(), series);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(&self, symbol: &str) -> Result<PriceSeries, EvotraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(EvotraderError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(symbol).cloned().unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, EvotraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn make_bar(index: usize, close: f64) -> OhlcvBar {
    OhlcvBar::from_tuple((
        START_MS + index as i64 * HOUR_MS,
        close,
        close * 1.01,
        close * 0.99,
        close,
        1_000.0,
    ))
    .unwrap()
}

/// Hourly bars with the given closes.
pub fn make_series(closes: &[f64]) -> PriceSeries {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(i, c))
        .collect();
    PriceSeries::new(bars).unwrap()
}

/// Oscillating, slowly trending closes so MACD and RSI cross their levels often.
pub fn wave_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let x = i as f64;
            100.0 + 0.05 * x + 8.0 * (x / 6.0).sin() + 3.0 * (x / 2.3).cos()
        })
        .collect()
}

pub fn wave_series(n: usize) -> PriceSeries {
    make_series(&wave_closes(n))
}

pub fn csv_content(closes: &[f64]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for (i, c) in closes.iter().enumerate() {
        out.push_str(&format!(
            "{},{},{},{},{},1000\n",
            START_MS + i as i64 * HOUR_MS,
            c,
            c * 1.01,
            c * 0.99,
            c
        ));
    }
    out
}

pub fn write_csv(dir: &Path, symbol: &str, closes: &[f64]) {
    std::fs::write(dir.join(format!("{}.csv", symbol)), csv_content(closes)).unwrap();
}

pub fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

//! CSV file data adapter.
//!
//! One file per symbol, `<base_path>/<symbol>.csv`, with the header
//! `timestamp,open,high,low,close,volume` and timestamps in epoch milliseconds.
//! Rows may appear in any order; they are sorted before the series is built.

use crate::domain::error::EvotraderError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::price_series::PriceSeries;
use crate::ports::data_port::DataPort;
use std::fs;
use std::path::PathBuf;

const COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    /// Parse CSV text into a sorted series.
    pub fn parse(content: &str) -> Result<PriceSeries, EvotraderError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let headers = rdr.headers().map_err(|e| EvotraderError::Data {
            reason: format!("CSV header error: {}", e),
        })?;
        let found: Vec<String> = headers.iter().map(str::to_lowercase).collect();
        if found.len() < COLUMNS.len() || found.iter().zip(COLUMNS).any(|(h, c)| h != c) {
            return Err(EvotraderError::Data {
                reason: format!(
                    "expected header {}, found {}",
                    COLUMNS.join(","),
                    found.join(",")
                ),
            });
        }

        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| EvotraderError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;
            let line = record.position().map_or(0, |p| p.line());

            let timestamp: i64 = field(&record, 0, line)?;
            let row = (
                timestamp,
                field(&record, 1, line)?,
                field(&record, 2, line)?,
                field(&record, 3, line)?,
                field(&record, 4, line)?,
                field(&record, 5, line)?,
            );
            let bar = OhlcvBar::from_tuple(row).ok_or_else(|| EvotraderError::Data {
                reason: format!("line {}: timestamp {} out of range", line, timestamp),
            })?;
            bars.push(bar);
        }

        bars.sort_by_key(|b| b.timestamp);
        PriceSeries::new(bars)
    }
}

fn field<T>(record: &csv::StringRecord, index: usize, line: u64) -> Result<T, EvotraderError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let name = COLUMNS[index];
    record
        .get(index)
        .ok_or_else(|| EvotraderError::Data {
            reason: format!("line {}: missing {} column", line, name),
        })?
        .parse()
        .map_err(|e| EvotraderError::Data {
            reason: format!("line {}: invalid {} value: {}", line, name, e),
        })
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(&self, symbol: &str) -> Result<PriceSeries, EvotraderError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| EvotraderError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        Self::parse(&content)
    }

    fn list_symbols(&self) -> Result<Vec<String>, EvotraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| EvotraderError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(symbol) = name_str.strip_suffix(".csv") {
                if !symbol.is_empty() {
                    symbols.push(symbol.to_string());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

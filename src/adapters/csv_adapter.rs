//! CSV bar file adapter.
//!
//! One file per ticker and interval, `{base}/{ticker}_{interval}.csv`, with a
//! header row `timestamp,open,high,low,close,volume`. Timestamps are either
//! `YYYY-MM-DD HH:MM:SS` or a bare date (taken as midnight).

use crate::domain::error::CoinbotError;
use crate::domain::ohlcv::{Bar, BarInterval};
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str, interval: BarInterval) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", ticker, interval))
    }
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_field(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64, String> {
    record
        .get(index)
        .ok_or_else(|| format!("missing {name} column"))?
        .trim()
        .parse()
        .map_err(|e| format!("invalid {name} value: {e}"))
}

impl DataPort for CsvAdapter {
    fn fetch_bars(&self, ticker: &str, interval: BarInterval) -> Result<Vec<Bar>, CoinbotError> {
        let path = self.csv_path(ticker, interval);
        let unavailable = || CoinbotError::DataUnavailable {
            ticker: ticker.to_string(),
            interval: interval.to_string(),
        };
        let content = fs::read_to_string(&path).map_err(|e| {
            tracing::debug!(path = %path.display(), error = %e, "bar file not readable");
            unavailable()
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| CoinbotError::PriceQuery {
                ticker: ticker.to_string(),
                reason: format!("CSV parse error: {e}"),
            })?;
            let malformed = |reason: String| CoinbotError::PriceQuery {
                ticker: ticker.to_string(),
                reason: format!("{} row {}: {}", path.display(), line + 2, reason),
            };

            let raw_ts = record
                .get(0)
                .ok_or_else(|| malformed("missing timestamp column".into()))?;
            let timestamp = parse_timestamp(raw_ts)
                .ok_or_else(|| malformed(format!("invalid timestamp '{raw_ts}'")))?;

            bars.push(Bar {
                timestamp,
                open: parse_field(&record, 1, "open").map_err(malformed)?,
                high: parse_field(&record, 2, "high").map_err(malformed)?,
                low: parse_field(&record, 3, "low").map_err(malformed)?,
                close: parse_field(&record, 4, "close").map_err(malformed)?,
                volume: parse_field(&record, 5, "volume").map_err(malformed)?,
            });
        }

        if bars.is_empty() {
            return Err(unavailable());
        }
        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }

    fn list_tickers(&self, interval: BarInterval) -> Result<Vec<String>, CoinbotError> {
        let entries = fs::read_dir(&self.base_path)?;

        let suffix = format!("_{}.csv", interval);
        let mut tickers = Vec::new();

        for entry in entries {
            let name = entry?.file_name();
            let name_str = name.to_string_lossy();

            if let Some(ticker) = name_str.strip_suffix(&suffix) {
                tickers.push(ticker.to_string());
            }
        }

        tickers.sort();
        Ok(tickers)
    }
}

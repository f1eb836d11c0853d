//! JSON file ledger store.
//!
//! Layout: one object keyed by ticker,
//! `{"KRW-BTC": {"buy_price": 100.0, "buy_time": "2024-07-01T09:00:00", "amount_krw": 5000.0}}`.
//! The whole file is rewritten on every save.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::domain::error::CoinbotError;
use crate::domain::position::Position;
use crate::ports::ledger_store::LedgerStore;

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Serialize, Deserialize)]
struct LedgerRecord {
    buy_price: f64,
    buy_time: String,
    amount_krw: f64,
}

pub struct JsonLedgerStore {
    path: PathBuf,
}

impl JsonLedgerStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn persistence_error(&self, reason: impl ToString) -> CoinbotError {
        CoinbotError::Persistence {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl LedgerStore for JsonLedgerStore {
    fn load(&self) -> Result<BTreeMap<String, Position>, CoinbotError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no ledger file, starting flat");
                return Ok(BTreeMap::new());
            }
            Err(e) => return Err(self.persistence_error(e)),
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        let records: BTreeMap<String, LedgerRecord> =
            serde_json::from_str(&content).map_err(|e| self.persistence_error(e))?;

        let mut positions = BTreeMap::new();
        for (ticker, record) in records {
            let opened_at = NaiveDateTime::parse_from_str(&record.buy_time, TIME_FORMAT)
                .map_err(|e| {
                    self.persistence_error(format!("{ticker}: bad buy_time '{}': {e}", record.buy_time))
                })?;
            if !(record.buy_price > 0.0) || !(record.amount_krw > 0.0) {
                return Err(CoinbotError::LedgerInvalid {
                    ticker,
                    reason: "stored position has non-positive price or amount".into(),
                });
            }
            let position = Position::new(&ticker, record.buy_price, record.amount_krw, opened_at);
            positions.insert(ticker, position);
        }
        Ok(positions)
    }

    fn save(&self, positions: &BTreeMap<String, Position>) -> Result<(), CoinbotError> {
        let records: BTreeMap<&str, LedgerRecord> = positions
            .iter()
            .map(|(ticker, p)| {
                (
                    ticker.as_str(),
                    LedgerRecord {
                        buy_price: p.avg_buy_price,
                        buy_time: p.opened_at.format(TIME_FORMAT).to_string(),
                        amount_krw: p.invested_amount,
                    },
                )
            })
            .collect();

        let json = serde_json::to_string_pretty(&records).map_err(|e| self.persistence_error(e))?;
        fs::write(&self.path, json).map_err(|e| self.persistence_error(e))
    }
}

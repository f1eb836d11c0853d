//! Durable map of open positions.
//!
//! The ledger owns every `Position`. Positions change only through
//! `upsert_buy` (create or average in) and `remove`, and each change is
//! followed by a full write of the snapshot through the `LedgerStore`.
//! A crash during that write can leave a truncated file behind.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use crate::domain::error::CoinbotError;
use crate::domain::position::Position;
use crate::ports::ledger_store::LedgerStore;

pub struct PositionLedger {
    positions: BTreeMap<String, Position>,
    store: Box<dyn LedgerStore>,
}

impl std::fmt::Debug for PositionLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionLedger")
            .field("positions", &self.positions)
            .finish_non_exhaustive()
    }
}

impl PositionLedger {
    /// Read the persisted snapshot once, at startup.
    pub fn load(store: Box<dyn LedgerStore>) -> Result<Self, CoinbotError> {
        let positions = store.load()?;
        Ok(PositionLedger { positions, store })
    }

    pub fn get(&self, ticker: &str) -> Option<&Position> {
        self.positions.get(ticker)
    }

    /// KRW currently committed to `ticker`, zero when flat.
    pub fn invested(&self, ticker: &str) -> f64 {
        self.positions
            .get(ticker)
            .map(|p| p.invested_amount)
            .unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn snapshot(&self) -> BTreeMap<String, Position> {
        self.positions.clone()
    }

    /// Record a confirmed buy leg. Creates the position or averages into it,
    /// then persists. A persistence error is returned after the in-memory
    /// update, since the order it describes has already filled.
    pub fn upsert_buy(
        &mut self,
        ticker: &str,
        price: f64,
        amount_krw: f64,
        timestamp: NaiveDateTime,
    ) -> Result<Position, CoinbotError> {
        if !(price > 0.0) || !(amount_krw > 0.0) {
            return Err(CoinbotError::LedgerInvalid {
                ticker: ticker.to_string(),
                reason: format!("buy leg needs positive price and amount, got {price} / {amount_krw}"),
            });
        }

        let position = self
            .positions
            .entry(ticker.to_string())
            .and_modify(|p| p.merge_buy(price, amount_krw, timestamp))
            .or_insert_with(|| Position::new(ticker, price, amount_krw, timestamp))
            .clone();

        self.persist()?;
        Ok(position)
    }

    /// Drop the position for `ticker`. Absent tickers are not a mutation and
    /// do not trigger a write.
    pub fn remove(&mut self, ticker: &str) -> Result<Option<Position>, CoinbotError> {
        let removed = self.positions.remove(ticker);
        if removed.is_some() {
            self.persist()?;
        }
        Ok(removed)
    }

    fn persist(&self) -> Result<(), CoinbotError> {
        self.store.save(&self.positions)
    }
}

//! Per-ticker async locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per ticker, created on first use. Holding the guard
/// serializes buy and sell work on that ticker; other tickers proceed.
#[derive(Debug, Default)]
pub struct TickerLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl TickerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, ticker: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks
                .entry(ticker.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

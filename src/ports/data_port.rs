//! Historical bar access port.

use crate::domain::error::CoinbotError;
use crate::domain::ohlcv::{Bar, BarInterval};

pub trait DataPort {
    /// All stored bars for `ticker` at `interval`, oldest first.
    fn fetch_bars(&self, ticker: &str, interval: BarInterval) -> Result<Vec<Bar>, CoinbotError>;

    fn list_tickers(&self, interval: BarInterval) -> Result<Vec<String>, CoinbotError>;
}

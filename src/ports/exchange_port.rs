//! Exchange access port.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::domain::error::CoinbotError;
use crate::domain::ohlcv::{Bar, BarInterval};

/// Balance key for the quote currency.
pub const CASH_ASSET: &str = "KRW";

/// What the exchange reported back for a submitted market order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderReceipt {
    pub order_id: String,
    /// Average fill price, when the exchange reports one.
    pub avg_price: Option<f64>,
    /// Executed base-asset volume, when reported.
    pub executed_volume: Option<f64>,
}

#[async_trait]
pub trait ExchangePort: Send + Sync {
    /// The most recent `count` bars, oldest first.
    async fn get_bars(
        &self,
        ticker: &str,
        interval: BarInterval,
        count: usize,
    ) -> Result<Vec<Bar>, CoinbotError>;

    /// Free balance of `asset`: `"KRW"` for cash, otherwise a ticker.
    async fn get_balance(&self, asset: &str) -> Result<f64, CoinbotError>;

    async fn get_current_price(&self, ticker: &str) -> Result<f64, CoinbotError>;

    /// Batched quote. Tickers the exchange cannot price are left out.
    async fn get_current_prices(
        &self,
        tickers: &[String],
    ) -> Result<HashMap<String, f64>, CoinbotError>;

    async fn submit_market_buy(
        &self,
        ticker: &str,
        krw_amount: f64,
    ) -> Result<OrderReceipt, CoinbotError>;

    async fn submit_market_sell(
        &self,
        ticker: &str,
        volume: f64,
    ) -> Result<OrderReceipt, CoinbotError>;
}

//! Simulated exchange over stored bar files.
//!
//! Quotes are the last close of the quote interval, orders fill in full at
//! that price, and balances live in memory. Fees are charged the way the
//! real venue charges them: on top of a buy and out of sell proceeds.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::error::CoinbotError;
use crate::domain::ohlcv::{Bar, BarInterval};
use crate::ports::data_port::DataPort;
use crate::ports::exchange_port::{CASH_ASSET, ExchangePort, OrderReceipt};

#[derive(Debug, Default)]
struct PaperBook {
    krw: f64,
    holdings: HashMap<String, f64>,
    next_order: u64,
}

pub struct PaperExchange {
    data: Box<dyn DataPort + Send + Sync>,
    quote_interval: BarInterval,
    fee_rate: f64,
    book: Mutex<PaperBook>,
}

impl PaperExchange {
    pub fn new(
        data: Box<dyn DataPort + Send + Sync>,
        initial_krw: f64,
        fee_rate: f64,
        quote_interval: BarInterval,
    ) -> Self {
        Self {
            data,
            quote_interval,
            fee_rate,
            book: Mutex::new(PaperBook {
                krw: initial_krw,
                ..Default::default()
            }),
        }
    }

    /// Seed a holding, e.g. to match a ledger restored from disk.
    pub fn with_holding(mut self, ticker: &str, volume: f64) -> Self {
        if let Ok(book) = self.book.get_mut() {
            book.holdings.insert(ticker.to_string(), volume);
        }
        self
    }

    fn book(&self) -> Result<std::sync::MutexGuard<'_, PaperBook>, CoinbotError> {
        self.book.lock().map_err(|_| CoinbotError::OrderExecution {
            ticker: CASH_ASSET.to_string(),
            reason: "paper book lock poisoned".into(),
        })
    }

    fn quote(&self, ticker: &str) -> Result<f64, CoinbotError> {
        let bars = self.data.fetch_bars(ticker, self.quote_interval)?;
        bars.last()
            .map(|b| b.close)
            .filter(|p| *p > 0.0)
            .ok_or_else(|| CoinbotError::PriceQuery {
                ticker: ticker.to_string(),
                reason: "no positive close to quote".into(),
            })
    }
}

#[async_trait]
impl ExchangePort for PaperExchange {
    async fn get_bars(
        &self,
        ticker: &str,
        interval: BarInterval,
        count: usize,
    ) -> Result<Vec<Bar>, CoinbotError> {
        let mut bars = self.data.fetch_bars(ticker, interval)?;
        let skip = bars.len().saturating_sub(count);
        Ok(bars.split_off(skip))
    }

    async fn get_balance(&self, asset: &str) -> Result<f64, CoinbotError> {
        let book = self.book()?;
        if asset == CASH_ASSET {
            Ok(book.krw)
        } else {
            Ok(book.holdings.get(asset).copied().unwrap_or(0.0))
        }
    }

    async fn get_current_price(&self, ticker: &str) -> Result<f64, CoinbotError> {
        self.quote(ticker)
    }

    async fn get_current_prices(
        &self,
        tickers: &[String],
    ) -> Result<HashMap<String, f64>, CoinbotError> {
        let mut prices = HashMap::new();
        for ticker in tickers {
            match self.quote(ticker) {
                Ok(price) => {
                    prices.insert(ticker.clone(), price);
                }
                Err(e) => tracing::debug!(%ticker, error = %e, "no paper quote"),
            }
        }
        Ok(prices)
    }

    async fn submit_market_buy(
        &self,
        ticker: &str,
        krw_amount: f64,
    ) -> Result<OrderReceipt, CoinbotError> {
        let price = self.quote(ticker)?;
        let mut book = self.book()?;
        let cost = krw_amount * (1.0 + self.fee_rate);
        if !(krw_amount > 0.0) || cost > book.krw {
            return Err(CoinbotError::OrderExecution {
                ticker: ticker.to_string(),
                reason: format!("insufficient KRW: need {:.0}, have {:.0}", cost, book.krw),
            });
        }

        let volume = krw_amount / price;
        book.krw -= cost;
        *book.holdings.entry(ticker.to_string()).or_insert(0.0) += volume;
        book.next_order += 1;

        Ok(OrderReceipt {
            order_id: format!("paper-{}", book.next_order),
            avg_price: Some(price),
            executed_volume: Some(volume),
        })
    }

    async fn submit_market_sell(
        &self,
        ticker: &str,
        volume: f64,
    ) -> Result<OrderReceipt, CoinbotError> {
        let price = self.quote(ticker)?;
        let mut book = self.book()?;
        let held = book.holdings.get(ticker).copied().unwrap_or(0.0);
        if !(volume > 0.0) || volume > held {
            return Err(CoinbotError::OrderExecution {
                ticker: ticker.to_string(),
                reason: format!("cannot sell {volume} with {held} held"),
            });
        }

        let proceeds = volume * price;
        book.krw += proceeds - proceeds * self.fee_rate;
        let remaining = held - volume;
        if remaining > 0.0 {
            book.holdings.insert(ticker.to_string(), remaining);
        } else {
            book.holdings.remove(ticker);
        }
        book.next_order += 1;

        Ok(OrderReceipt {
            order_id: format!("paper-{}", book.next_order),
            avg_price: Some(price),
            executed_volume: Some(volume),
        })
    }
}

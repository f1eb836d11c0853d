//! Open positions and closed trade records.

use chrono::NaiveDateTime;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub ticker: String,
    /// Weighted average over every buy leg.
    pub avg_buy_price: f64,
    /// KRW committed across all buy legs; always > 0 while the position exists.
    pub invested_amount: f64,
    /// Time of the most recent buy leg.
    pub opened_at: NaiveDateTime,
}

impl Position {
    pub fn new(ticker: &str, price: f64, amount_krw: f64, timestamp: NaiveDateTime) -> Self {
        Position {
            ticker: ticker.to_string(),
            avg_buy_price: price,
            invested_amount: amount_krw,
            opened_at: timestamp,
        }
    }

    /// Fold another buy leg into the position (averaging-in).
    pub fn merge_buy(&mut self, price: f64, amount_krw: f64, timestamp: NaiveDateTime) {
        let total = self.invested_amount + amount_krw;
        self.avg_buy_price =
            (self.avg_buy_price * self.invested_amount + price * amount_krw) / total;
        self.invested_amount = total;
        self.opened_at = timestamp;
    }

    /// Percentage move of `price` relative to the average buy price.
    pub fn return_pct(&self, price: f64) -> f64 {
        (price - self.avg_buy_price) / self.avg_buy_price * 100.0
    }
}

/// Where a recorded fill price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSource {
    /// Average fill price reported by the exchange.
    Fill,
    /// Current price quoted right after the fill.
    Quote,
    /// Quote failed after a sell; the trigger price stands in and P&L is an estimate.
    TriggerFallback,
    /// Quote failed after a buy; the latest bar's open stands in.
    BarFallback,
    /// Replayed bar, backtest only.
    Simulated,
}

impl PriceSource {
    pub fn is_estimate(&self) -> bool {
        matches!(self, PriceSource::TriggerFallback | PriceSource::BarFallback)
    }
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSource::Fill => f.write_str("fill"),
            PriceSource::Quote => f.write_str("quote"),
            PriceSource::TriggerFallback => f.write_str("trigger price, estimated"),
            PriceSource::BarFallback => f.write_str("bar open, estimated"),
            PriceSource::Simulated => f.write_str("simulated"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub ticker: String,
    pub entry_price: f64,
    pub exit_price: f64,
    pub invested_amount: f64,
    pub exit_value: f64,
    pub buy_fee: f64,
    pub sell_fee: f64,
    pub realized_pnl: f64,
    pub opened_at: NaiveDateTime,
    pub closed_at: NaiveDateTime,
    pub price_source: PriceSource,
}

impl ClosedTrade {
    /// Gross return before fees, as a percentage of the invested amount.
    pub fn gross_return_pct(&self) -> f64 {
        if self.invested_amount > 0.0 {
            (self.exit_value - self.invested_amount) / self.invested_amount * 100.0
        } else {
            0.0
        }
    }

    pub fn is_win(&self) -> bool {
        self.exit_price > self.entry_price
    }
}

//! Order execution against the exchange.
//!
//! `ExecutionCoordinator` turns entry and exit decisions into market orders
//! and applies confirmed fills to the ledger and the accounting engine. The
//! ledger and accounting mutexes are only taken between awaits; the per-ticker
//! async lock is held for a whole `try_buy` or `try_sell`.

use chrono::{Local, NaiveDateTime};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::domain::accounting::{Accounting, ExitFill, RunState};
use crate::domain::error::CoinbotError;
use crate::domain::indicator::IndicatorSet;
use crate::domain::ledger::PositionLedger;
use crate::domain::ohlcv::BarInterval;
use crate::domain::position::{ClosedTrade, Position, PriceSource};
use crate::domain::signal::{EntryCheck, EvaluationMode, ExitReason, check_entry, evaluate_exit};
use crate::domain::strategy::{Strategy, StrategyParams};
use crate::ports::exchange_port::{CASH_ASSET, ExchangePort};
use crate::ports::notifier_port::NotifierPort;
use crate::trading::locks::TickerLocks;

#[derive(Debug, Clone, PartialEq)]
pub struct TradingConfig {
    pub fee_rate: f64,
    pub min_order_krw: f64,
    /// KRW balance is divided by this before sizing, leaving room for the fee.
    pub fee_buffer: f64,
    /// Invested share of the target at which a ticker counts as fully allocated.
    pub allocation_guard: f64,
    pub request_timeout: Duration,
    pub buy_bar_interval: BarInterval,
    pub buy_bar_count: usize,
    pub sell_bar_interval: BarInterval,
    pub sell_bar_count: usize,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            fee_rate: 0.0005,
            min_order_krw: 5000.0,
            fee_buffer: 1.001,
            allocation_guard: 0.98,
            request_timeout: Duration::from_secs(10),
            buy_bar_interval: BarInterval::Minute240,
            buy_bar_count: 50,
            sell_bar_interval: BarInterval::Minute1,
            sell_bar_count: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuyOutcome {
    Bought {
        position: Position,
        amount_krw: f64,
        price: f64,
        price_source: PriceSource,
    },
    EntryRejected(EntryCheck),
    FullyAllocated { invested: f64, target: f64 },
    BelowMinimum { amount: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SellOutcome {
    NoPosition,
    Hold { return_pct: f64 },
    /// Exit fired but the exchange balance was already zero.
    Cleared,
    Sold { trade: ClosedTrade, reason: ExitReason },
}

/// Total account value: KRW plus every priced holding.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetValuation {
    pub total: f64,
    pub krw: f64,
    /// Tickers left out because their balance or price was unavailable.
    pub excluded: Vec<String>,
}

pub struct ExecutionCoordinator {
    exchange: Arc<dyn ExchangePort>,
    notifier: Arc<dyn NotifierPort>,
    ledger: Mutex<PositionLedger>,
    accounting: Mutex<Accounting>,
    locks: TickerLocks,
    strategy: Strategy,
    config: TradingConfig,
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

impl ExecutionCoordinator {
    pub fn new(
        exchange: Arc<dyn ExchangePort>,
        notifier: Arc<dyn NotifierPort>,
        ledger: PositionLedger,
        accounting: Accounting,
        strategy: Strategy,
        config: TradingConfig,
    ) -> Self {
        Self {
            exchange,
            notifier,
            ledger: Mutex::new(ledger),
            accounting: Mutex::new(accounting),
            locks: TickerLocks::new(),
            strategy,
            config,
        }
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    fn ledger(&self) -> MutexGuard<'_, PositionLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn accounting(&self) -> MutexGuard<'_, Accounting> {
        self.accounting.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn positions(&self) -> Vec<Position> {
        self.ledger().snapshot().into_values().collect()
    }

    pub fn open_tickers(&self) -> Vec<String> {
        self.ledger().snapshot().into_keys().collect()
    }

    pub fn run_state(&self, running: bool) -> RunState {
        self.accounting().run_state(running)
    }

    /// Accounting summary followed by one line per open position.
    pub fn status_report(&self, running: bool) -> String {
        let mut report = self.accounting().summary(running);
        let positions = self.positions();
        if positions.is_empty() {
            report.push_str("\nPositions:        none");
        } else {
            report.push_str("\nPositions:");
            for p in positions {
                report.push_str(&format!(
                    "\n  {} avg {:.4} invested {:.0} KRW since {}",
                    p.ticker,
                    p.avg_buy_price,
                    p.invested_amount,
                    p.opened_at.format("%Y-%m-%d %H:%M")
                ));
            }
        }
        report
    }

    /// Send a notification; failures are logged and swallowed.
    pub async fn notify(&self, text: &str) {
        if let Err(e) = self.notifier.send(text).await {
            tracing::warn!(error = %e, "notification failed");
        }
    }

    async fn call<T, F>(&self, operation: &str, fut: F) -> Result<T, CoinbotError>
    where
        F: Future<Output = Result<T, CoinbotError>>,
    {
        match tokio::time::timeout(self.config.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CoinbotError::Timeout {
                operation: operation.to_string(),
                seconds: self.config.request_timeout.as_secs(),
            }),
        }
    }

    /// KRW balance plus balance × current price for each configured ticker.
    pub async fn total_asset(&self) -> Result<AssetValuation, CoinbotError> {
        let krw = self
            .call("get_balance", self.exchange.get_balance(CASH_ASSET))
            .await?;

        let mut excluded = Vec::new();
        let mut held = Vec::new();
        for ticker in self.strategy.ticker_names() {
            match self
                .call("get_balance", self.exchange.get_balance(&ticker))
                .await
            {
                Ok(volume) if volume > 0.0 => held.push((ticker, volume)),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(%ticker, error = %e, "balance unavailable for valuation");
                    excluded.push(ticker);
                }
            }
        }

        let prices = if held.is_empty() {
            HashMap::new()
        } else {
            let names: Vec<String> = held.iter().map(|(t, _)| t.clone()).collect();
            match self
                .call("get_current_prices", self.exchange.get_current_prices(&names))
                .await
            {
                Ok(prices) => prices,
                Err(e) => {
                    tracing::warn!(error = %e, "prices unavailable for valuation");
                    HashMap::new()
                }
            }
        };

        let mut total = krw;
        for (ticker, volume) in held {
            match prices.get(&ticker) {
                Some(price) => total += volume * price,
                None => excluded.push(ticker),
            }
        }

        if !excluded.is_empty() {
            self.notify(&format!(
                "total asset excludes {}: balance or price unavailable",
                excluded.join(", ")
            ))
            .await;
        }

        Ok(AssetValuation {
            total,
            krw,
            excluded,
        })
    }

    pub async fn try_buy(
        &self,
        ticker: &str,
        params: &StrategyParams,
    ) -> Result<BuyOutcome, CoinbotError> {
        let _guard = self.locks.lock(ticker).await;

        let bars = self
            .call(
                "get_bars",
                self.exchange.get_bars(
                    ticker,
                    self.config.buy_bar_interval,
                    self.config.buy_bar_count,
                ),
            )
            .await?;
        let Some(latest) = bars.last() else {
            return Err(CoinbotError::DataUnavailable {
                ticker: ticker.to_string(),
                interval: self.config.buy_bar_interval.to_string(),
            });
        };

        let indicators =
            IndicatorSet::compute(&bars, self.strategy.ma_window, self.strategy.rsi_period);
        let last = bars.len() - 1;
        let check = check_entry(
            latest,
            indicators.ma.value_at(last),
            indicators.rsi.value_at(last),
            params,
        );
        if !check.accepted() {
            tracing::info!(%ticker, reason = %check.reason_text(), "entry rejected");
            self.notify(&format!("[{ticker}] no buy: {}", check.reason_text()))
                .await;
            return Ok(BuyOutcome::EntryRejected(check));
        }

        let valuation = self.total_asset().await?;
        let target = valuation.total * params.risk_ratio;
        let invested = self.ledger().invested(ticker);
        if invested >= self.config.allocation_guard * target {
            tracing::info!(%ticker, invested, target, "fully allocated");
            return Ok(BuyOutcome::FullyAllocated { invested, target });
        }

        let krw = self
            .call("get_balance", self.exchange.get_balance(CASH_ASSET))
            .await?;
        let amount = (target - invested).min(krw / self.config.fee_buffer);
        if amount < self.config.min_order_krw {
            tracing::info!(%ticker, amount, minimum = self.config.min_order_krw, "order below minimum");
            return Ok(BuyOutcome::BelowMinimum { amount });
        }

        let receipt = self
            .call(
                "submit_market_buy",
                self.exchange.submit_market_buy(ticker, amount),
            )
            .await?;

        let (price, price_source) = match receipt.avg_price.filter(|p| *p > 0.0) {
            Some(p) => (p, PriceSource::Fill),
            None => match self
                .call("get_current_price", self.exchange.get_current_price(ticker))
                .await
            {
                Ok(p) if p > 0.0 => (p, PriceSource::Quote),
                _ => (latest.open, PriceSource::BarFallback),
            },
        };

        let fee = self.accounting().record_buy_fee(amount);
        let recorded = self.ledger().upsert_buy(ticker, price, amount, now());
        let position = match recorded {
            Ok(position) => position,
            Err(e) => {
                tracing::error!(%ticker, order_id = %receipt.order_id, error = %e, "bought but ledger write failed");
                self.notify(&format!(
                    "[{ticker}] bought {amount:.0} KRW but the ledger could not be saved: {e}"
                ))
                .await;
                return Err(e);
            }
        };

        tracing::info!(%ticker, order_id = %receipt.order_id, amount, price, %price_source, "bought");
        self.notify(&format!(
            "[{ticker}] bought {amount:.0} KRW at {price} ({price_source}), fee {fee:.0} KRW, avg {:.4}, invested {:.0} KRW",
            position.avg_buy_price, position.invested_amount
        ))
        .await;

        Ok(BuyOutcome::Bought {
            position,
            amount_krw: amount,
            price,
            price_source,
        })
    }

    pub async fn try_sell(
        &self,
        ticker: &str,
        params: &StrategyParams,
    ) -> Result<SellOutcome, CoinbotError> {
        let _guard = self.locks.lock(ticker).await;

        let Some(position) = self.ledger().get(ticker).cloned() else {
            return Ok(SellOutcome::NoPosition);
        };

        let bars = self
            .call(
                "get_bars",
                self.exchange.get_bars(
                    ticker,
                    self.config.sell_bar_interval,
                    self.config.sell_bar_count,
                ),
            )
            .await?;
        let Some(bar) = bars.last() else {
            return Err(CoinbotError::DataUnavailable {
                ticker: ticker.to_string(),
                interval: self.config.sell_bar_interval.to_string(),
            });
        };

        let Some(exit) = evaluate_exit(position.avg_buy_price, bar, params, EvaluationMode::Live)
        else {
            let return_pct = position.return_pct(bar.close);
            tracing::debug!(%ticker, return_pct, "holding");
            return Ok(SellOutcome::Hold { return_pct });
        };

        let volume = self
            .call("get_balance", self.exchange.get_balance(ticker))
            .await?;
        if volume <= 0.0 {
            let removed = self.ledger().remove(ticker);
            tracing::warn!(%ticker, "exit fired with zero balance, clearing position");
            self.notify(&format!(
                "[{ticker}] {} reached but balance is zero; position cleared",
                exit.reason
            ))
            .await;
            removed?;
            return Ok(SellOutcome::Cleared);
        }

        let receipt = self
            .call(
                "submit_market_sell",
                self.exchange.submit_market_sell(ticker, volume),
            )
            .await?;

        let (price, price_source) = match receipt.avg_price.filter(|p| *p > 0.0) {
            Some(p) => (p, PriceSource::Fill),
            None => match self
                .call("get_current_price", self.exchange.get_current_price(ticker))
                .await
            {
                Ok(p) if p > 0.0 => (p, PriceSource::Quote),
                _ => (exit.price, PriceSource::TriggerFallback),
            },
        };

        let trade = self.accounting().settle_exit(
            &position,
            ExitFill {
                price,
                value: volume * price,
                closed_at: now(),
                price_source,
            },
        );
        let removed = self.ledger().remove(ticker);
        let (cash, accumulated, mdd) = {
            let accounting = self.accounting();
            (
                accounting.current_cash(),
                accounting.accumulated_return(),
                accounting.max_drawdown_pct(),
            )
        };

        tracing::info!(
            %ticker,
            order_id = %receipt.order_id,
            reason = %exit.reason,
            realized_pnl = trade.realized_pnl,
            %price_source,
            "sold"
        );
        self.notify(&format!(
            "[{ticker}] {} sell at {price} ({price_source})\n\
             P&L {:+.0} KRW ({:+.2}%), fees {:.0} KRW\n\
             cash {:.0} KRW, return {:.4}, MDD {:.2}%",
            exit.reason,
            trade.realized_pnl,
            trade.gross_return_pct(),
            trade.buy_fee + trade.sell_fee,
            cash,
            accumulated,
            mdd,
        ))
        .await;

        if let Err(e) = removed {
            self.notify(&format!("[{ticker}] sold but the ledger could not be saved: {e}"))
                .await;
            return Err(e);
        }

        Ok(SellOutcome::Sold {
            trade,
            reason: exit.reason,
        })
    }
}

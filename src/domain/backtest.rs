//! Bar-replay backtest.
//!
//! Replays historical bars through the same indicator, signal and accounting
//! code the live loops use. Each entry is opened at the bar's open and closed
//! within the same bar: at take-profit, at stop-loss, or at the close.

use crate::domain::accounting::{Accounting, ExitFill, RunState};
use crate::domain::error::CoinbotError;
use crate::domain::indicator::IndicatorSet;
use crate::domain::ohlcv::Bar;
use crate::domain::position::{ClosedTrade, Position, PriceSource};
use crate::domain::signal::{EvaluationMode, evaluate_exit, should_enter};
use crate::domain::strategy::StrategyParams;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_cash: f64,
    pub fee_rate: f64,
    pub ma_window: usize,
    pub rsi_period: usize,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub ticker: String,
    pub trades: Vec<ClosedTrade>,
    pub accounting: Accounting,
    pub bars_processed: usize,
}

impl BacktestResult {
    pub fn run_state(&self) -> RunState {
        self.accounting.run_state(false)
    }

    /// Profit after fees; fees are already inside the running cash.
    pub fn net_profit(&self) -> f64 {
        self.run_state().profit()
    }
}

pub fn run_backtest(
    ticker: &str,
    bars: &[Bar],
    params: &StrategyParams,
    config: &BacktestConfig,
) -> Result<BacktestResult, CoinbotError> {
    // first replayed index: 20 for the default 20/14 windows
    let start = config.ma_window.max(config.rsi_period);
    if bars.len() <= start {
        return Err(CoinbotError::InsufficientData {
            ticker: ticker.to_string(),
            bars: bars.len(),
            minimum: start + 1,
        });
    }

    let indicators = IndicatorSet::compute(bars, config.ma_window, config.rsi_period);
    let mut accounting = Accounting::new(config.start_cash, config.fee_rate);
    let mut trades = Vec::new();

    for (i, bar) in bars.iter().enumerate().skip(start) {
        let entered = bar.open > 0.0
            && should_enter(
                bar,
                indicators.ma.value_at(i),
                indicators.rsi.value_at(i),
                params,
            );

        if !entered {
            let cash = accounting.current_cash();
            accounting.mark_cash(cash);
            continue;
        }

        let entry = bar.open;
        let Some(exit) = evaluate_exit(entry, bar, params, EvaluationMode::Simulation) else {
            continue;
        };

        let trade_amount = accounting.current_cash() * params.risk_ratio;
        accounting.record_buy_fee(trade_amount);
        let position = Position::new(ticker, entry, trade_amount, bar.timestamp);
        let trade = accounting.settle_exit(
            &position,
            ExitFill {
                price: exit.price,
                value: trade_amount * exit.price / entry,
                closed_at: bar.timestamp,
                price_source: PriceSource::Simulated,
            },
        );
        trades.push(trade);
    }

    Ok(BacktestResult {
        ticker: ticker.to_string(),
        trades,
        accounting,
        bars_processed: bars.len() - start,
    })
}

//! Fee accrual, realized P&L, running cash and drawdown.
//!
//! Shared by live trading and the backtest. Both price fees off the amount
//! actually traded: the KRW spent on the buy leg and the value received on the
//! sell leg.

use chrono::NaiveDateTime;
use std::fmt;

use crate::domain::position::{ClosedTrade, Position, PriceSource};

/// Exit fill handed to [`Accounting::settle_exit`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExitFill {
    pub price: f64,
    pub value: f64,
    pub closed_at: NaiveDateTime,
    pub price_source: PriceSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Accounting {
    fee_rate: f64,
    start_cash: f64,
    current_cash: f64,
    peak_cash: f64,
    lowest_cash: f64,
    max_drawdown_pct: f64,
    total_fee_paid: f64,
    trade_count: usize,
    win_count: usize,
    estimated_exits: usize,
}

/// Point-in-time view of the run, including the scheduler's running flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunState {
    pub running: bool,
    pub total_fee_paid: f64,
    pub start_cash: f64,
    pub current_cash: f64,
    pub peak_cash: f64,
    pub lowest_cash: f64,
    pub max_drawdown_pct: f64,
    pub trade_count: usize,
    pub win_count: usize,
    pub estimated_exits: usize,
}

impl Accounting {
    pub fn new(start_cash: f64, fee_rate: f64) -> Self {
        Accounting {
            fee_rate,
            start_cash,
            current_cash: start_cash,
            peak_cash: start_cash,
            lowest_cash: start_cash,
            max_drawdown_pct: 0.0,
            total_fee_paid: 0.0,
            trade_count: 0,
            win_count: 0,
            estimated_exits: 0,
        }
    }

    pub fn fee(&self, trade_value: f64) -> f64 {
        trade_value * self.fee_rate
    }

    /// Accrue the fee on a confirmed buy leg and return it.
    pub fn record_buy_fee(&mut self, amount_krw: f64) -> f64 {
        let fee = self.fee(amount_krw);
        self.total_fee_paid += fee;
        fee
    }

    /// Close `position` at `fill`. The buy-leg fee is recomputed from the
    /// invested amount for the P&L; only the sell-leg fee is accrued here,
    /// since the buy fee was accrued when the buy filled.
    pub fn settle_exit(&mut self, position: &Position, fill: ExitFill) -> ClosedTrade {
        let buy_fee = self.fee(position.invested_amount);
        let sell_fee = self.fee(fill.value);
        let realized_pnl = fill.value - position.invested_amount - buy_fee - sell_fee;

        self.total_fee_paid += sell_fee;
        self.trade_count += 1;
        if fill.price > position.avg_buy_price {
            self.win_count += 1;
        }
        if fill.price_source.is_estimate() {
            self.estimated_exits += 1;
        }
        self.mark_cash(self.current_cash + realized_pnl);

        ClosedTrade {
            ticker: position.ticker.clone(),
            entry_price: position.avg_buy_price,
            exit_price: fill.price,
            invested_amount: position.invested_amount,
            exit_value: fill.value,
            buy_fee,
            sell_fee,
            realized_pnl,
            opened_at: position.opened_at,
            closed_at: fill.closed_at,
            price_source: fill.price_source,
        }
    }

    /// Set the running cash and fold it into peak, trough and max drawdown.
    pub fn mark_cash(&mut self, cash: f64) {
        self.current_cash = cash;
        self.peak_cash = self.peak_cash.max(cash);
        self.lowest_cash = self.lowest_cash.min(cash);
        self.max_drawdown_pct = self.max_drawdown_pct.max(self.drawdown_pct());
    }

    pub fn drawdown_pct(&self) -> f64 {
        if self.peak_cash > 0.0 {
            (self.peak_cash - self.current_cash) / self.peak_cash * 100.0
        } else {
            0.0
        }
    }

    pub fn accumulated_return(&self) -> f64 {
        if self.start_cash > 0.0 {
            self.current_cash / self.start_cash
        } else {
            1.0
        }
    }

    pub fn win_rate(&self) -> f64 {
        if self.trade_count > 0 {
            self.win_count as f64 / self.trade_count as f64
        } else {
            0.0
        }
    }

    pub fn current_cash(&self) -> f64 {
        self.current_cash
    }

    pub fn max_drawdown_pct(&self) -> f64 {
        self.max_drawdown_pct
    }

    pub fn total_fee_paid(&self) -> f64 {
        self.total_fee_paid
    }

    /// Multi-line report for notifications and the CLI.
    pub fn summary(&self, running: bool) -> String {
        self.run_state(running).to_string()
    }

    pub fn run_state(&self, running: bool) -> RunState {
        RunState {
            running,
            total_fee_paid: self.total_fee_paid,
            start_cash: self.start_cash,
            current_cash: self.current_cash,
            peak_cash: self.peak_cash,
            lowest_cash: self.lowest_cash,
            max_drawdown_pct: self.max_drawdown_pct,
            trade_count: self.trade_count,
            win_count: self.win_count,
            estimated_exits: self.estimated_exits,
        }
    }
}

impl RunState {
    pub fn accumulated_return(&self) -> f64 {
        if self.start_cash > 0.0 {
            self.current_cash / self.start_cash
        } else {
            1.0
        }
    }

    pub fn win_rate(&self) -> f64 {
        if self.trade_count > 0 {
            self.win_count as f64 / self.trade_count as f64
        } else {
            0.0
        }
    }

    pub fn profit(&self) -> f64 {
        self.current_cash - self.start_cash
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Running:          {}", if self.running { "yes" } else { "no" })?;
        writeln!(f, "Trades:           {}", self.trade_count)?;
        writeln!(f, "Wins:             {}", self.win_count)?;
        writeln!(f, "Win Rate:         {:.2}%", self.win_rate() * 100.0)?;
        writeln!(f, "Accumulated:      {:.4}", self.accumulated_return())?;
        writeln!(f, "Current Cash:     {:.0} KRW", self.current_cash)?;
        writeln!(f, "Highest Cash:     {:.0} KRW", self.peak_cash)?;
        writeln!(f, "Lowest Cash:      {:.0} KRW", self.lowest_cash)?;
        writeln!(f, "Profit:           {:.0} KRW", self.profit())?;
        writeln!(f, "Fees Paid:        {:.0} KRW", self.total_fee_paid)?;
        write!(f, "Max Drawdown:     {:.2}%", self.max_drawdown_pct)?;
        if self.estimated_exits > 0 {
            write!(f, "\nEstimated Exits:  {}", self.estimated_exits)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn ts(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn fee_is_proportional() {
        let acct = Accounting::new(1_000_000.0, 0.0005);
        assert_relative_eq!(acct.fee(1_000_000.0), 500.0, epsilon = 1e-9);
    }

    #[test]
    fn take_profit_round_trip() {
        let mut acct = Accounting::new(1_000_000.0, 0.0005);
        let buy_fee = acct.record_buy_fee(1_000_000.0);
        assert_relative_eq!(buy_fee, 500.0, epsilon = 1e-9);

        let position = Position::new("KRW-BTC", 100.0, 1_000_000.0, ts(1));
        let trade = acct.settle_exit(
            &position,
            ExitFill {
                price: 110.0,
                value: 1_100_000.0,
                closed_at: ts(2),
                price_source: PriceSource::Quote,
            },
        );

        assert_relative_eq!(trade.buy_fee, 500.0, epsilon = 1e-9);
        assert_relative_eq!(trade.sell_fee, 550.0, epsilon = 1e-9);
        // 1,100,000 - 1,000,000 - (500 + 550)
        assert_relative_eq!(trade.realized_pnl, 98_950.0, epsilon = 1e-6);
        assert_relative_eq!(acct.current_cash(), 1_098_950.0, epsilon = 1e-6);
        assert_relative_eq!(acct.total_fee_paid(), 1_050.0, epsilon = 1e-9);
        assert_relative_eq!(acct.accumulated_return(), 1.09895, epsilon = 1e-9);
        assert_relative_eq!(acct.win_rate(), 1.0);
    }

    #[test]
    fn drawdown_sequence() {
        let mut acct = Accounting::new(1_000_000.0, 0.0005);
        let mut previous = acct.max_drawdown_pct();
        for cash in [1_000_000.0, 1_048_950.0, 950_000.0] {
            acct.mark_cash(cash);
            assert!(acct.max_drawdown_pct() >= previous);
            previous = acct.max_drawdown_pct();
        }
        let expected = (1_048_950.0 - 950_000.0) / 1_048_950.0 * 100.0;
        assert_relative_eq!(acct.max_drawdown_pct(), expected, epsilon = 1e-9);
        assert!((acct.max_drawdown_pct() - 9.43).abs() < 0.01);
    }

    #[test]
    fn max_drawdown_survives_recovery() {
        let mut acct = Accounting::new(100.0, 0.0);
        acct.mark_cash(80.0);
        acct.mark_cash(120.0);
        assert_relative_eq!(acct.drawdown_pct(), 0.0);
        assert_relative_eq!(acct.max_drawdown_pct(), 20.0);
        let state = acct.run_state(false);
        assert_relative_eq!(state.peak_cash, 120.0);
        assert_relative_eq!(state.lowest_cash, 80.0);
    }

    #[test]
    fn fallback_priced_exit_is_counted() {
        let mut acct = Accounting::new(100_000.0, 0.0005);
        let position = Position::new("KRW-XRP", 500.0, 50_000.0, ts(1));
        let trade = acct.settle_exit(
            &position,
            ExitFill {
                price: 475.0,
                value: 47_500.0,
                closed_at: ts(3),
                price_source: PriceSource::TriggerFallback,
            },
        );
        assert!(trade.realized_pnl < 0.0);
        assert!(!trade.is_win());
        let state = acct.run_state(true);
        assert_eq!(state.estimated_exits, 1);
        assert_eq!(state.win_count, 0);
        assert!(state.to_string().contains("Estimated Exits:  1"));
    }
}

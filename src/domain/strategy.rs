//! Per-ticker strategy parameters and the ticker table.

/// Entry/exit and sizing parameters for one ticker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyParams {
    /// Entry requires RSI strictly below this.
    pub rsi_limit: f64,
    /// Multiplier on entry price; must be > 1.
    pub take_profit_ratio: f64,
    /// Multiplier on entry price; must be < 1.
    pub stop_loss_ratio: f64,
    /// Fraction of total asset value targeted for the ticker, in (0, 1].
    pub risk_ratio: f64,
}

impl StrategyParams {
    pub fn take_profit_price(&self, entry_price: f64) -> f64 {
        entry_price * self.take_profit_ratio
    }

    pub fn stop_loss_price(&self, entry_price: f64) -> f64 {
        entry_price * self.stop_loss_ratio
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickerConfig {
    pub ticker: String,
    pub params: StrategyParams,
}

/// Indicator windows plus the static ticker table, in configured order.
#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub ma_window: usize,
    pub rsi_period: usize,
    pub tickers: Vec<TickerConfig>,
}

impl Strategy {
    pub fn params_for(&self, ticker: &str) -> Option<&StrategyParams> {
        self.tickers
            .iter()
            .find(|t| t.ticker == ticker)
            .map(|t| &t.params)
    }

    pub fn ticker_names(&self) -> Vec<String> {
        self.tickers.iter().map(|t| t.ticker.clone()).collect()
    }

    /// Bars needed before both indicators are defined on the latest bar.
    pub fn min_bars(&self) -> usize {
        self.ma_window.max(self.rsi_period + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> StrategyParams {
        StrategyParams {
            rsi_limit: 99.0,
            take_profit_ratio: 1.10,
            stop_loss_ratio: 0.93,
            risk_ratio: 1.0,
        }
    }

    fn sample_strategy() -> Strategy {
        Strategy {
            ma_window: 20,
            rsi_period: 14,
            tickers: vec![
                TickerConfig {
                    ticker: "KRW-AERGO".into(),
                    params: sample_params(),
                },
                TickerConfig {
                    ticker: "KRW-SNT".into(),
                    params: StrategyParams {
                        rsi_limit: 70.0,
                        take_profit_ratio: 1.05,
                        stop_loss_ratio: 0.92,
                        risk_ratio: 0.5,
                    },
                },
            ],
        }
    }

    #[test]
    fn threshold_prices() {
        let p = sample_params();
        assert!((p.take_profit_price(100.0) - 110.0).abs() < 1e-9);
        assert!((p.stop_loss_price(100.0) - 93.0).abs() < 1e-9);
    }

    #[test]
    fn params_lookup() {
        let s = sample_strategy();
        assert_eq!(s.params_for("KRW-SNT").map(|p| p.risk_ratio), Some(0.5));
        assert!(s.params_for("KRW-BTC").is_none());
    }

    #[test]
    fn ticker_names_keep_config_order() {
        let s = sample_strategy();
        assert_eq!(s.ticker_names(), vec!["KRW-AERGO", "KRW-SNT"]);
    }

    #[test]
    fn min_bars_covers_both_windows() {
        let s = sample_strategy();
        assert_eq!(s.min_bars(), 20);
        let short_ma = Strategy {
            ma_window: 5,
            ..sample_strategy()
        };
        assert_eq!(short_ma.min_bars(), 15);
    }
}

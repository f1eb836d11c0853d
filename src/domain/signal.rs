//! Entry and exit decisions.
//!
//! Everything here is pure: indicators and parameters in, a decision out.
//! Orders, ledger writes and notifications happen in the trading layer.

use std::fmt;

use crate::domain::ohlcv::Bar;
use crate::domain::strategy::StrategyParams;

/// Live trading holds when neither threshold is touched; a simulation closes
/// the trade at the bar's close so every entry produces a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationMode {
    Live,
    Simulation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    EndOfBar,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::TakeProfit => f.write_str("take-profit"),
            ExitReason::StopLoss => f.write_str("stop-loss"),
            ExitReason::EndOfBar => f.write_str("end-of-bar"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitSignal {
    pub price: f64,
    pub reason: ExitReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryRejection {
    MaUndefined,
    RsiUndefined,
    RsiAtOrAboveLimit { rsi: f64, limit: f64 },
    CloseAtOrBelowMa { close: f64, ma: f64 },
}

impl fmt::Display for EntryRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryRejection::MaUndefined => f.write_str("moving average not yet defined"),
            EntryRejection::RsiUndefined => f.write_str("RSI not yet defined"),
            EntryRejection::RsiAtOrAboveLimit { rsi, limit } => {
                write!(f, "RSI {:.2} >= {}", rsi, limit)
            }
            EntryRejection::CloseAtOrBelowMa { close, ma } => {
                write!(f, "close {:.0} <= MA {:.0}", close, ma)
            }
        }
    }
}

/// Entry decision with the conditions that failed, if any.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntryCheck {
    pub rejections: Vec<EntryRejection>,
}

impl EntryCheck {
    pub fn accepted(&self) -> bool {
        self.rejections.is_empty()
    }

    /// Failed conditions joined for a notification line.
    pub fn reason_text(&self) -> String {
        self.rejections
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" & ")
    }
}

/// `close > ma && rsi < rsi_limit`, false while either indicator is undefined.
pub fn should_enter(bar: &Bar, ma: Option<f64>, rsi: Option<f64>, params: &StrategyParams) -> bool {
    check_entry(bar, ma, rsi, params).accepted()
}

pub fn check_entry(
    bar: &Bar,
    ma: Option<f64>,
    rsi: Option<f64>,
    params: &StrategyParams,
) -> EntryCheck {
    let mut rejections = Vec::new();

    match rsi {
        None => rejections.push(EntryRejection::RsiUndefined),
        Some(rsi) if !(rsi < params.rsi_limit) => {
            rejections.push(EntryRejection::RsiAtOrAboveLimit {
                rsi,
                limit: params.rsi_limit,
            })
        }
        Some(_) => {}
    }

    match ma {
        None => rejections.push(EntryRejection::MaUndefined),
        Some(ma) if !(bar.close > ma) => rejections.push(EntryRejection::CloseAtOrBelowMa {
            close: bar.close,
            ma,
        }),
        Some(_) => {}
    }

    EntryCheck { rejections }
}

/// Take-profit is checked before stop-loss, so a bar that spans both
/// thresholds exits at the take-profit price.
pub fn evaluate_exit(
    entry_price: f64,
    bar: &Bar,
    params: &StrategyParams,
    mode: EvaluationMode,
) -> Option<ExitSignal> {
    let take_profit = params.take_profit_price(entry_price);
    let stop_loss = params.stop_loss_price(entry_price);

    if bar.high >= take_profit {
        Some(ExitSignal {
            price: take_profit,
            reason: ExitReason::TakeProfit,
        })
    } else if bar.low <= stop_loss {
        Some(ExitSignal {
            price: stop_loss,
            reason: ExitReason::StopLoss,
        })
    } else {
        match mode {
            EvaluationMode::Live => None,
            EvaluationMode::Simulation => Some(ExitSignal {
                price: bar.close,
                reason: ExitReason::EndOfBar,
            }),
        }
    }
}

//! Technical indicator implementations.
//!
//! - `IndicatorPoint`: a single point in an indicator time series
//! - `IndicatorType`: indicator identity + parameters
//! - `IndicatorSeries`: a time series aligned 1:1 with its input bars
//! - `IndicatorSet`: the moving average and RSI pair the strategy reads
//!
//! Series are recomputed from the full bar window on every poll. Keeping
//! trailing sums between polls would make this incremental, but the RSI must
//! stay the simple rolling mean either way so live and backtest agree.

pub mod rsi;
pub mod sma;

use chrono::NaiveDateTime;
use std::fmt;

use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub valid: bool,
    pub value: f64,
}

impl IndicatorPoint {
    pub fn get(&self) -> Option<f64> {
        if self.valid { Some(self.value) } else { None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Rsi(usize),
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// An all-invalid series aligned with `bars`.
    pub(crate) fn undefined(indicator_type: IndicatorType, bars: &[Bar]) -> Self {
        IndicatorSeries {
            indicator_type,
            values: bars
                .iter()
                .map(|b| IndicatorPoint {
                    timestamp: b.timestamp,
                    valid: false,
                    value: 0.0,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.values.get(index).and_then(IndicatorPoint::get)
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.last().and_then(IndicatorPoint::get)
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "MA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
        }
    }
}

/// Moving average and RSI computed over the same bars.
#[derive(Debug, Clone)]
pub struct IndicatorSet {
    pub ma: IndicatorSeries,
    pub rsi: IndicatorSeries,
}

impl IndicatorSet {
    pub fn compute(bars: &[Bar], ma_window: usize, rsi_period: usize) -> Self {
        IndicatorSet {
            ma: sma::calculate_sma(bars, ma_window),
            rsi: rsi::calculate_rsi(bars, rsi_period),
        }
    }
}

//! Ticker universe: parsing the configured list and screening candidates.
//!
//! The screener keeps the most-traded fraction of a universe by latest daily
//! volume, then reports the tickers whose latest close sits inside a band
//! around the moving average.

use std::collections::HashSet;

use crate::domain::error::CoinbotError;
use crate::domain::indicator::IndicatorSet;
use crate::domain::ohlcv::BarInterval;
use crate::ports::data_port::DataPort;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),
}

pub fn parse_tickers(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let ticker = trimmed.to_uppercase();
        if !seen.insert(ticker.clone()) {
            return Err(UniverseError::DuplicateTicker(ticker));
        }
        tickers.push(ticker);
    }

    Ok(tickers)
}

/// Keep the top `ratio` share of `volumes` by volume, rounded down.
pub fn select_top_volume(mut volumes: Vec<(String, f64)>, ratio: f64) -> Vec<String> {
    volumes.sort_by(|a, b| b.1.total_cmp(&a.1));
    let keep = (volumes.len() as f64 * ratio).floor() as usize;
    volumes.into_iter().take(keep).map(|(t, _)| t).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenConfig {
    pub volume_ratio: f64,
    /// Half-width of the band around the MA, e.g. 0.05 for +/-5%.
    pub band: f64,
    pub ma_window: usize,
    pub rsi_period: usize,
    pub interval: BarInterval,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenHit {
    pub ticker: String,
    pub close: f64,
    pub ma: f64,
    pub rsi: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData,
    InsufficientBars { bars: usize },
    OutsideBand,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedTicker {
    pub ticker: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default)]
pub struct ScreenResult {
    pub candidates: Vec<String>,
    pub hits: Vec<ScreenHit>,
    pub skipped: Vec<SkippedTicker>,
}

pub fn screen_universe(
    data_port: &dyn DataPort,
    config: &ScreenConfig,
) -> Result<ScreenResult, CoinbotError> {
    let mut volumes = Vec::new();
    for ticker in data_port.list_tickers(BarInterval::Day)? {
        match data_port.fetch_bars(&ticker, BarInterval::Day) {
            Ok(bars) => {
                if let Some(last) = bars.last() {
                    volumes.push((ticker, last.volume));
                }
            }
            Err(e) => tracing::warn!(%ticker, error = %e, "skipping ticker without daily bars"),
        }
    }

    let candidates = select_top_volume(volumes, config.volume_ratio);
    let mut result = ScreenResult {
        candidates: candidates.clone(),
        ..Default::default()
    };

    for ticker in candidates {
        let bars = match data_port.fetch_bars(&ticker, config.interval) {
            Ok(bars) => bars,
            Err(_) => {
                result.skipped.push(SkippedTicker {
                    ticker,
                    reason: SkipReason::NoData,
                });
                continue;
            }
        };
        if bars.len() < config.ma_window {
            result.skipped.push(SkippedTicker {
                ticker,
                reason: SkipReason::InsufficientBars { bars: bars.len() },
            });
            continue;
        }

        let indicators = IndicatorSet::compute(&bars, config.ma_window, config.rsi_period);
        let (Some(last), Some(ma)) = (bars.last(), indicators.ma.latest()) else {
            continue;
        };
        let lower = ma * (1.0 - config.band);
        let upper = ma * (1.0 + config.band);

        if (lower..=upper).contains(&last.close) {
            result.hits.push(ScreenHit {
                ticker,
                close: last.close,
                ma,
                rsi: indicators.rsi.latest(),
            });
        } else {
            result.skipped.push(SkippedTicker {
                ticker,
                reason: SkipReason::OutsideBand,
            });
        }
    }

    Ok(result)
}

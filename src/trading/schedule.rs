//! Loop cadence.

use chrono::{Duration as ChronoDuration, NaiveDateTime};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    /// Buy cycles run every this many hours, aligned to midnight.
    pub buy_interval_hours: u32,
    /// Delay after a candle boundary so the closed candle is published.
    pub buy_settle: Duration,
    /// Buy loop poll interval while stopped.
    pub stopped_poll: Duration,
    pub sell_interval: Duration,
    /// Sell loop wait while no positions are open.
    pub sell_idle: Duration,
    pub error_backoff: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            buy_interval_hours: 4,
            buy_settle: Duration::from_secs(60),
            stopped_poll: Duration::from_secs(5),
            sell_interval: Duration::from_secs(300),
            sell_idle: Duration::from_secs(600),
            error_backoff: Duration::from_secs(60),
        }
    }
}

/// First `boundary + settle` strictly after `now`, where boundaries fall every
/// `hours` hours from midnight.
pub fn next_candle_boundary(now: NaiveDateTime, hours: u32, settle: Duration) -> NaiveDateTime {
    let period = i64::from(hours.max(1)) * 3600;
    let midnight = now.date().and_time(chrono::NaiveTime::MIN);
    let since_midnight = (now - midnight).num_seconds();
    let settle = ChronoDuration::seconds(settle.as_secs() as i64);

    let candidate =
        midnight + ChronoDuration::seconds(since_midnight / period * period) + settle;
    if candidate > now {
        candidate
    } else {
        candidate + ChronoDuration::seconds(period)
    }
}

/// Time to wait from `now` until `until`, zero if already past.
pub fn wait_until(now: NaiveDateTime, until: NaiveDateTime) -> Duration {
    (until - now).to_std().unwrap_or(Duration::ZERO)
}

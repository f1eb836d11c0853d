//! OHLCV bar representation.

use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Closing value traded during the bar, close * volume.
    pub fn traded_value(&self) -> f64 {
        self.close * self.volume
    }
}

/// Bar intervals, spelled the way the exchange names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarInterval {
    Minute1,
    Minute60,
    Minute240,
    Day,
}

impl BarInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BarInterval::Minute1 => "minute1",
            BarInterval::Minute60 => "minute60",
            BarInterval::Minute240 => "minute240",
            BarInterval::Day => "day",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "minute1" => Some(BarInterval::Minute1),
            "minute60" => Some(BarInterval::Minute60),
            "minute240" => Some(BarInterval::Minute240),
            "day" => Some(BarInterval::Day),
            _ => None,
        }
    }
}

impl std::fmt::Display for BarInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_bar() -> Bar {
        Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close: 105.0,
            volume: 2.0,
        }
    }

    #[test]
    fn typical_price() {
        let bar = sample_bar();
        let expected = (110.0 + 90.0 + 105.0) / 3.0;
        assert!((bar.typical_price() - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn traded_value() {
        assert!((sample_bar().traded_value() - 210.0).abs() < f64::EPSILON);
    }

    #[test]
    fn interval_round_trips_through_str() {
        for interval in [
            BarInterval::Minute1,
            BarInterval::Minute60,
            BarInterval::Minute240,
            BarInterval::Day,
        ] {
            assert_eq!(BarInterval::parse(interval.as_str()), Some(interval));
        }
        assert_eq!(BarInterval::parse(" Minute240 "), Some(BarInterval::Minute240));
        assert_eq!(BarInterval::parse("week"), None);
    }
}

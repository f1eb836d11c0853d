//! Configuration validation.
//!
//! Validates all config fields before the bot or a backtest starts.

use crate::domain::error::CoinbotError;
use crate::domain::ohlcv::BarInterval;
use crate::domain::universe::parse_tickers;
use crate::ports::config_port::ConfigPort;

pub fn validate_bot_config(config: &dyn ConfigPort) -> Result<(), CoinbotError> {
    validate_fee_rate(config)?;
    validate_order_limits(config)?;
    validate_schedule(config)?;
    validate_indicators(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), CoinbotError> {
    validate_indicators(config)?;
    for ticker in configured_tickers(config)? {
        validate_ticker_params(config, &ticker)?;
    }
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), CoinbotError> {
    validate_fee_rate(config)?;
    let total = config.get_double("backtest", "total_investment", 1_000_000.0);
    if total <= 0.0 {
        return Err(invalid(
            "backtest",
            "total_investment",
            "total_investment must be positive",
        ));
    }
    validate_interval(config, "backtest", "interval", "minute240")?;
    for ticker in configured_tickers(config)? {
        let allocation = config.get_double(&ticker, "allocation", 1.0);
        if !(0.0..=1.0).contains(&allocation) {
            return Err(invalid(&ticker, "allocation", "allocation must be between 0 and 1"));
        }
    }
    Ok(())
}

/// The `[trading] tickers` list, parsed and de-duplicated.
pub fn configured_tickers(config: &dyn ConfigPort) -> Result<Vec<String>, CoinbotError> {
    let raw = config
        .get_string("trading", "tickers")
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| CoinbotError::ConfigMissing {
            section: "trading".to_string(),
            key: "tickers".to_string(),
        })?;
    parse_tickers(&raw).map_err(|e| invalid("trading", "tickers", &e.to_string()))
}

fn invalid(section: &str, key: &str, reason: &str) -> CoinbotError {
    CoinbotError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_fee_rate(config: &dyn ConfigPort) -> Result<(), CoinbotError> {
    let value = config.get_double("bot", "fee_rate", 0.0005);
    if !(0.0..0.1).contains(&value) {
        return Err(invalid("bot", "fee_rate", "fee_rate must be in [0, 0.1)"));
    }
    Ok(())
}

fn validate_order_limits(config: &dyn ConfigPort) -> Result<(), CoinbotError> {
    if config.get_double("bot", "min_order_krw", 5000.0) <= 0.0 {
        return Err(invalid("bot", "min_order_krw", "min_order_krw must be positive"));
    }
    if config.get_double("bot", "fee_buffer", 1.001) < 1.0 {
        return Err(invalid("bot", "fee_buffer", "fee_buffer must be at least 1"));
    }
    let guard = config.get_double("bot", "allocation_guard", 0.98);
    if guard <= 0.0 || guard > 1.0 {
        return Err(invalid(
            "bot",
            "allocation_guard",
            "allocation_guard must be in (0, 1]",
        ));
    }
    if config.get_int("bot", "request_timeout_secs", 10) < 1 {
        return Err(invalid(
            "bot",
            "request_timeout_secs",
            "request_timeout_secs must be at least 1",
        ));
    }
    Ok(())
}

fn validate_schedule(config: &dyn ConfigPort) -> Result<(), CoinbotError> {
    let hours = config.get_int("schedule", "buy_interval_hours", 4);
    if !(1..=24).contains(&hours) || 24 % hours != 0 {
        return Err(invalid(
            "schedule",
            "buy_interval_hours",
            "buy_interval_hours must divide 24",
        ));
    }
    for (key, default) in [
        ("stopped_poll_secs", 5),
        ("sell_interval_secs", 300),
        ("sell_idle_secs", 600),
        ("error_backoff_secs", 60),
    ] {
        if config.get_int("schedule", key, default) < 1 {
            return Err(invalid("schedule", key, "interval must be at least 1 second"));
        }
    }
    if config.get_int("schedule", "buy_settle_secs", 60) < 0 {
        return Err(invalid(
            "schedule",
            "buy_settle_secs",
            "buy_settle_secs must be non-negative",
        ));
    }
    Ok(())
}

fn validate_indicators(config: &dyn ConfigPort) -> Result<(), CoinbotError> {
    for (key, default) in [("ma_window", 20), ("rsi_period", 14)] {
        if config.get_int("indicators", key, default) < 1 {
            return Err(invalid("indicators", key, "window must be at least 1"));
        }
    }
    let ma = config.get_int("indicators", "ma_window", 20);
    let rsi = config.get_int("indicators", "rsi_period", 14);
    let count = config.get_int("indicators", "buy_bar_count", 50);
    if count < ma.max(rsi + 1) {
        return Err(invalid(
            "indicators",
            "buy_bar_count",
            "buy_bar_count must cover the indicator windows",
        ));
    }
    if config.get_int("indicators", "sell_bar_count", 1) < 1 {
        return Err(invalid(
            "indicators",
            "sell_bar_count",
            "sell_bar_count must be at least 1",
        ));
    }
    validate_interval(config, "indicators", "buy_bar_interval", "minute240")?;
    validate_interval(config, "indicators", "sell_bar_interval", "minute1")?;
    Ok(())
}

fn validate_interval(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: &str,
) -> Result<(), CoinbotError> {
    let value = config
        .get_string(section, key)
        .unwrap_or_else(|| default.to_string());
    if BarInterval::parse(&value).is_none() {
        return Err(invalid(
            section,
            key,
            &format!("unknown interval '{value}', expected minute1, minute60, minute240 or day"),
        ));
    }
    Ok(())
}

fn required_double(config: &dyn ConfigPort, section: &str, key: &str) -> Result<f64, CoinbotError> {
    let raw = config
        .get_string(section, key)
        .ok_or_else(|| CoinbotError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        })?;
    raw.trim()
        .parse::<f64>()
        .map_err(|_| invalid(section, key, &format!("'{raw}' is not a number")))
}

fn validate_ticker_params(config: &dyn ConfigPort, ticker: &str) -> Result<(), CoinbotError> {
    let rsi_limit = required_double(config, ticker, "rsi_limit")?;
    if rsi_limit <= 0.0 || rsi_limit > 100.0 {
        return Err(invalid(ticker, "rsi_limit", "rsi_limit must be in (0, 100]"));
    }
    let take_profit = required_double(config, ticker, "take_profit_ratio")?;
    if take_profit <= 1.0 {
        return Err(invalid(
            ticker,
            "take_profit_ratio",
            "take_profit_ratio must be greater than 1",
        ));
    }
    let stop_loss = required_double(config, ticker, "stop_loss_ratio")?;
    if stop_loss <= 0.0 || stop_loss >= 1.0 {
        return Err(invalid(
            ticker,
            "stop_loss_ratio",
            "stop_loss_ratio must be in (0, 1)",
        ));
    }
    let risk = required_double(config, ticker, "risk_ratio")?;
    if risk <= 0.0 || risk > 1.0 {
        return Err(invalid(ticker, "risk_ratio", "risk_ratio must be in (0, 1]"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const VALID: &str = r#"
[bot]
fee_rate = 0.0005
min_order_krw = 5000

[schedule]
buy_interval_hours = 4
sell_interval_secs = 300

[indicators]
ma_window = 20
rsi_period = 14
buy_bar_count = 50

[trading]
tickers = KRW-AERGO, KRW-SNT

[KRW-AERGO]
rsi_limit = 99
take_profit_ratio = 1.10
stop_loss_ratio = 0.93
risk_ratio = 1.0

[KRW-SNT]
rsi_limit = 70
take_profit_ratio = 1.05
stop_loss_ratio = 0.92
risk_ratio = 0.5
allocation = 0.5
"#;

    #[test]
    fn valid_config_passes() {
        let config = make_config(VALID);
        assert!(validate_bot_config(&config).is_ok());
        assert!(validate_strategy_config(&config).is_ok());
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn configured_tickers_are_parsed() {
        let config = make_config(VALID);
        assert_eq!(
            configured_tickers(&config).unwrap(),
            vec!["KRW-AERGO", "KRW-SNT"]
        );
    }

    #[test]
    fn missing_tickers_fails() {
        let config = make_config("[bot]\nfee_rate = 0.0005\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, CoinbotError::ConfigMissing { key, .. } if key == "tickers"));
    }

    #[test]
    fn negative_fee_rate_fails() {
        let config = make_config("[bot]\nfee_rate = -0.1\n");
        let err = validate_bot_config(&config).unwrap_err();
        assert!(matches!(err, CoinbotError::ConfigInvalid { key, .. } if key == "fee_rate"));
    }

    #[test]
    fn buy_interval_must_divide_day() {
        let config = make_config("[schedule]\nbuy_interval_hours = 5\n");
        let err = validate_bot_config(&config).unwrap_err();
        assert!(
            matches!(err, CoinbotError::ConfigInvalid { key, .. } if key == "buy_interval_hours")
        );
    }

    #[test]
    fn unknown_interval_fails() {
        let config = make_config("[indicators]\nsell_bar_interval = minute3\n");
        let err = validate_bot_config(&config).unwrap_err();
        assert!(
            matches!(err, CoinbotError::ConfigInvalid { key, .. } if key == "sell_bar_interval")
        );
    }

    #[test]
    fn bar_count_must_cover_windows() {
        let config = make_config("[indicators]\nma_window = 20\nbuy_bar_count = 10\n");
        let err = validate_bot_config(&config).unwrap_err();
        assert!(matches!(err, CoinbotError::ConfigInvalid { key, .. } if key == "buy_bar_count"));
    }

    #[test]
    fn take_profit_ratio_must_exceed_one() {
        let config = make_config(&VALID.replace("take_profit_ratio = 1.10", "take_profit_ratio = 1.0"));
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(
            matches!(err, CoinbotError::ConfigInvalid { key, .. } if key == "take_profit_ratio")
        );
    }

    #[test]
    fn stop_loss_ratio_must_be_below_one() {
        let config = make_config(&VALID.replace("stop_loss_ratio = 0.93", "stop_loss_ratio = 1.2"));
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(
            matches!(err, CoinbotError::ConfigInvalid { key, .. } if key == "stop_loss_ratio")
        );
    }

    #[test]
    fn risk_ratio_out_of_range_fails() {
        let config = make_config(&VALID.replace("risk_ratio = 0.5", "risk_ratio = 1.5"));
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, CoinbotError::ConfigInvalid { key, .. } if key == "risk_ratio"));
    }

    #[test]
    fn missing_ticker_param_fails() {
        let config = make_config(&VALID.replace("rsi_limit = 70\n", ""));
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(
            err,
            CoinbotError::ConfigMissing { section, key } if section == "KRW-SNT" && key == "rsi_limit"
        ));
    }

    #[test]
    fn allocation_out_of_range_fails() {
        let config = make_config(&VALID.replace("allocation = 0.5", "allocation = 2"));
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, CoinbotError::ConfigInvalid { key, .. } if key == "allocation"));
    }
}
